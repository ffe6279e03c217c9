//! Protocol records, version snapshots and the branch ledger.
//!
//! A [`Protocol`] carries its current steps plus a capped history of
//! [`VersionSnapshot`]s. A snapshot captures the state *before* a mutation
//! that increments `current_version`; the history keeps at most
//! [`MAX_VERSIONS`] entries, evicting the oldest first.
//!
//! The branch ledger is append-only: one [`BranchEntry`] per distinct
//! non-default branch name, recorded the first time a pull request from that
//! branch is merged. Branches never diverge, close or get superseded.

use std::collections::HashSet;
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use protoreview_core::{Change, ProtocolId, Step, UserId, compute_step_diff, renumber};
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;

/// Maximum number of snapshots kept per protocol.
pub const MAX_VERSIONS: usize = 50;

/// Branch name that never gets a ledger entry.
pub const MAIN_BRANCH: &str = "main";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Publication state of a protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolStatus {
    /// Being written; the initial state.
    #[default]
    Draft,
    /// Visible to others.
    Published,
    /// Retired.
    Archived,
}

impl FromStr for ProtocolStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            other => Err(format!(
                "unknown status '{other}' (expected draft, published or archived)"
            )),
        }
    }
}

impl fmt::Display for ProtocolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Published => write!(f, "published"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// Immutable capture of a protocol's state before a version bump.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    /// Title at the time.
    pub title: String,
    /// Description at the time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Deep copy of the steps at the time.
    pub steps: Vec<Step>,
    /// When the snapshot was taken (Unix ms).
    pub saved_at: u64,
    /// Who caused the snapshot.
    pub saved_by: UserId,
    /// The `current_version` this snapshot preserves.
    pub version_number: u32,
}

/// One entry of the append-only branch ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchEntry {
    /// Branch name.
    pub name: String,
    /// When the branch was first merged (Unix ms).
    pub created_at: u64,
    /// Author of the pull request that introduced it.
    pub created_by: UserId,
    /// The protocol version the branch's first merge was applied on top of.
    pub base_version: u32,
}

/// A protocol: an ordered list of experimental steps with version history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    /// Record id.
    pub id: ProtocolId,
    /// Title.
    pub title: String,
    /// Optional long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owner.
    pub author_id: UserId,
    /// Publication state.
    #[serde(default)]
    pub status: ProtocolStatus,
    /// Current steps, densely ordered `1..=N`.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Monotonically increasing, starts at 1.
    pub current_version: u32,
    /// Snapshot history, oldest first, at most [`MAX_VERSIONS`].
    #[serde(default)]
    pub versions: Vec<VersionSnapshot>,
    /// Branch of the most recent merge.
    pub current_branch: String,
    /// Append-only branch ledger.
    #[serde(default)]
    pub branches: Vec<BranchEntry>,
    /// Creation time (Unix ms).
    pub created_at: u64,
    /// Last modification time (Unix ms).
    pub updated_at: u64,
}

/// Partial update applied by [`Protocol::apply_edit`]. `None` leaves a field
/// untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolEdit {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// Replacement steps; renumbered on apply.
    #[serde(default)]
    pub steps: Option<Vec<Step>>,
    /// New publication state.
    #[serde(default)]
    pub status: Option<ProtocolStatus>,
}

impl ProtocolEdit {
    /// `true` if the edit changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.steps.is_none()
            && self.status.is_none()
    }
}

// ---------------------------------------------------------------------------
// Protocol behaviour
// ---------------------------------------------------------------------------

impl Protocol {
    /// Create a draft protocol at version 1 with no history.
    ///
    /// Steps are renumbered to their positions.
    #[must_use]
    pub fn new(
        id: ProtocolId,
        author_id: UserId,
        title: impl Into<String>,
        description: Option<String>,
        mut steps: Vec<Step>,
        default_branch: &str,
        now: u64,
    ) -> Self {
        renumber(&mut steps);
        Self {
            id,
            title: title.into(),
            description,
            author_id,
            status: ProtocolStatus::Draft,
            steps,
            current_version: 1,
            versions: Vec::new(),
            current_branch: default_branch.to_owned(),
            branches: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Capture the current state as a snapshot of `current_version`.
    #[must_use]
    pub fn snapshot(&self, saved_by: &UserId, now: u64) -> VersionSnapshot {
        VersionSnapshot {
            title: self.title.clone(),
            description: self.description.clone(),
            steps: self.steps.clone(),
            saved_at: now,
            saved_by: saved_by.clone(),
            version_number: self.current_version,
        }
    }

    /// Append a snapshot, evicting the oldest entries beyond [`MAX_VERSIONS`].
    pub fn push_version(&mut self, snapshot: VersionSnapshot) {
        self.versions.push(snapshot);
        if self.versions.len() > MAX_VERSIONS {
            let excess = self.versions.len() - MAX_VERSIONS;
            self.versions.drain(..excess);
        }
    }

    /// Snapshot the current state and bump `current_version`.
    ///
    /// Call this before mutating the content that the new version will hold.
    pub fn begin_version(&mut self, saved_by: &UserId, now: u64) {
        let snapshot = self.snapshot(saved_by, now);
        self.push_version(snapshot);
        self.current_version += 1;
    }

    /// `true` if the ledger already records `name`.
    #[must_use]
    pub fn has_branch(&self, name: &str) -> bool {
        self.branches.iter().any(|b| b.name == name)
    }

    /// Record `name` in the branch ledger unless it is the main branch or
    /// already present. Returns `true` if an entry was appended.
    pub fn record_branch(&mut self, name: &str, created_by: &UserId, base_version: u32, now: u64) -> bool {
        if name.is_empty() || name == MAIN_BRANCH || self.has_branch(name) {
            return false;
        }
        self.branches.push(BranchEntry {
            name: name.to_owned(),
            created_at: now,
            created_by: created_by.clone(),
            base_version,
        });
        true
    }

    /// Apply a partial edit. Replacement steps are validated and renumbered.
    ///
    /// # Errors
    /// Returns [`ReviewError::Validation`] if the title is blank or the
    /// steps are malformed. The protocol is untouched on error.
    pub fn apply_edit(&mut self, edit: ProtocolEdit, now: u64) -> Result<(), ReviewError> {
        if let Some(title) = &edit.title
            && title.trim().is_empty()
        {
            return Err(ReviewError::validation("protocol title must not be blank"));
        }
        if let Some(steps) = &edit.steps {
            validate_steps(steps)?;
        }

        if let Some(title) = edit.title {
            self.title = title;
        }
        if let Some(description) = edit.description {
            self.description = Some(description).filter(|d| !d.is_empty());
        }
        if let Some(mut steps) = edit.steps {
            renumber(&mut steps);
            self.steps = steps;
        }
        if let Some(status) = edit.status {
            self.status = status;
        }
        self.updated_at = now;
        Ok(())
    }

    /// All versions oldest first, the current state last.
    #[must_use]
    pub fn history(&self) -> Vec<VersionView<'_>> {
        let mut out: Vec<VersionView<'_>> = self
            .versions
            .iter()
            .enumerate()
            .map(|(index, v)| VersionView {
                index,
                version_number: v.version_number,
                title: &v.title,
                description: v.description.as_deref(),
                steps: &v.steps,
                saved_at: Some(v.saved_at),
                saved_by: Some(&v.saved_by),
                current: false,
            })
            .collect();
        out.push(VersionView {
            index: self.versions.len(),
            version_number: self.current_version,
            title: &self.title,
            description: self.description.as_deref(),
            steps: &self.steps,
            saved_at: None,
            saved_by: None,
            current: true,
        });
        out
    }

    /// Compare two entries of [`history`](Self::history) by index.
    ///
    /// # Errors
    /// Returns [`ReviewError::Validation`] if either index is out of range.
    pub fn compare_versions(&self, left: usize, right: usize) -> Result<VersionComparison, ReviewError> {
        let history = self.history();
        let pick = |i: usize| {
            history.get(i).ok_or_else(|| {
                ReviewError::validation(format!(
                    "version index {i} out of range (0..={})",
                    history.len() - 1
                ))
            })
        };
        let (l, r) = (pick(left)?, pick(right)?);
        Ok(VersionComparison {
            left: l.to_owned_summary(),
            right: r.to_owned_summary(),
            changes: compute_step_diff(l.steps, r.steps),
            left_text: render_text(l.title, l.description, l.steps),
            right_text: render_text(r.title, r.description, r.steps),
        })
    }
}

/// Check that a step list is well formed: every step valid, ids unique.
///
/// # Errors
/// Returns [`ReviewError::Validation`] describing the first problem.
pub fn validate_steps(steps: &[Step]) -> Result<(), ReviewError> {
    let mut seen = HashSet::new();
    for step in steps {
        step.validate()?;
        if !seen.insert(&step.id) {
            return Err(ReviewError::validation(format!(
                "duplicate step id '{}'",
                step.id
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Version views
// ---------------------------------------------------------------------------

/// A borrowed view of one history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionView<'a> {
    /// Position in oldest-first order.
    pub index: usize,
    /// The version number the entry preserves.
    pub version_number: u32,
    /// Title.
    pub title: &'a str,
    /// Description.
    pub description: Option<&'a str>,
    /// Steps.
    pub steps: &'a [Step],
    /// Snapshot time; `None` for the current state.
    pub saved_at: Option<u64>,
    /// Snapshot author; `None` for the current state.
    pub saved_by: Option<&'a UserId>,
    /// `true` for the live state.
    pub current: bool,
}

impl VersionView<'_> {
    fn to_owned_summary(self) -> VersionSummary {
        VersionSummary {
            index: self.index,
            version_number: self.version_number,
            title: self.title.to_owned(),
            saved_at: self.saved_at,
            saved_by: self.saved_by.cloned(),
            current: self.current,
            step_count: self.steps.len(),
        }
    }
}

/// Owned header of a compared version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    /// Position in oldest-first order.
    pub index: usize,
    /// The version number the entry preserves.
    pub version_number: u32,
    /// Title.
    pub title: String,
    /// Snapshot time; absent for the current state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<u64>,
    /// Snapshot author; absent for the current state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_by: Option<UserId>,
    /// `true` for the live state.
    pub current: bool,
    /// Number of steps.
    pub step_count: usize,
}

/// Result of comparing two versions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionComparison {
    /// The older side, as requested.
    pub left: VersionSummary,
    /// The newer side, as requested.
    pub right: VersionSummary,
    /// Structured step diff from left to right.
    pub changes: Vec<Change>,
    /// Plain-text rendering of the left side.
    pub left_text: String,
    /// Plain-text rendering of the right side.
    pub right_text: String,
}

/// Render a protocol state as plain text, one block per step.
#[must_use]
pub fn render_text(title: &str, description: Option<&str>, steps: &[Step]) -> String {
    let mut out = format!(
        "Title: {title}\nDescription: {}\n\nSteps:\n",
        description.unwrap_or("")
    );
    let blocks: Vec<String> = steps
        .iter()
        .map(|s| {
            let mut block = String::new();
            let _ = write!(
                block,
                "Step {}: {}\nReagents: {}\nEquipment: {}\nTiming: {}\nNotes: {}",
                s.order,
                s.title,
                s.reagents.join(", "),
                s.equipment.join(", "),
                s.timing.as_deref().unwrap_or(""),
                s.notes.as_deref().unwrap_or("")
            );
            block
        })
        .collect();
    out.push_str(&blocks.join("\n\n"));
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
