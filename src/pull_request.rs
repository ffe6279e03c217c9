//! Pull request records and their status lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//! open ──┬─→ changes_requested ⇄ approved ──┬─→ merged
//!        │                                  └─→ closed
//!        └─→ merged | closed
//! ```
//!
//! `merged` and `closed` are terminal. Review aggregation lives in
//! [`crate::review`]; merging lives in [`crate::merge`].

use std::fmt;
use std::str::FromStr;

use protoreview_core::{Change, ProtocolId, PullRequestId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PrStatus
// ---------------------------------------------------------------------------

/// Aggregate status of a pull request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrStatus {
    /// Awaiting verdicts.
    #[default]
    Open,
    /// At least one reviewer asked for changes.
    ChangesRequested,
    /// Every reviewer (other than the author) approved.
    Approved,
    /// Applied to the protocol. Terminal.
    Merged,
    /// Abandoned. Terminal.
    Closed,
}

impl PrStatus {
    /// Returns `true` for `Merged` and `Closed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Merged | Self::Closed)
    }

    /// Returns the set of statuses reachable from this one.
    #[must_use]
    pub const fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Open => &[
                Self::ChangesRequested,
                Self::Approved,
                Self::Merged,
                Self::Closed,
            ],
            Self::ChangesRequested => &[Self::Approved, Self::Merged, Self::Closed],
            Self::Approved => &[Self::ChangesRequested, Self::Merged, Self::Closed],
            Self::Merged | Self::Closed => &[],
        }
    }

    /// Check whether moving to `next` is allowed. Staying put always is,
    /// except on a terminal status.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        (self == next && !self.is_terminal()) || self.valid_transitions().contains(next)
    }
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::ChangesRequested => write!(f, "changes_requested"),
            Self::Approved => write!(f, "approved"),
            Self::Merged => write!(f, "merged"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Reviewers
// ---------------------------------------------------------------------------

/// A reviewer's current verdict.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Assigned, no verdict yet.
    #[default]
    Pending,
    /// Approved.
    Approved,
    /// Asked for changes.
    ChangesRequested,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::ChangesRequested => write!(f, "changes_requested"),
        }
    }
}

/// A verdict a reviewer can submit. `pending` is not submittable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Approve the change set.
    Approved,
    /// Ask the author for changes.
    ChangesRequested,
}

impl From<Verdict> for ReviewStatus {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Approved => Self::Approved,
            Verdict::ChangesRequested => Self::ChangesRequested,
        }
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" | "approve" => Ok(Self::Approved),
            "changes_requested" | "request-changes" => Ok(Self::ChangesRequested),
            other => Err(format!(
                "review status must be 'approved' or 'changes_requested', got '{other}'"
            )),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ReviewStatus::from(*self).fmt(f)
    }
}

/// One reviewer entry. `user_id` is unique within a pull request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    /// The reviewer.
    pub user_id: UserId,
    /// Latest verdict; earlier verdicts are not retained.
    #[serde(default)]
    pub status: ReviewStatus,
    /// When the latest verdict was given (Unix ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<u64>,
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// A comment on a pull request. Comments have no effect on status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Record id, unique within the pull request.
    pub id: String,
    /// Who wrote it.
    pub author_id: UserId,
    /// Body text.
    pub text: String,
    /// The step id the comment is attached to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// When it was written (Unix ms).
    pub created_at: u64,
}

// ---------------------------------------------------------------------------
// PullRequest
// ---------------------------------------------------------------------------

/// A proposed change set against one protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// Record id.
    pub id: PullRequestId,
    /// Target protocol.
    pub protocol_id: ProtocolId,
    /// Who opened it.
    pub author_id: UserId,
    /// Lineage label recorded on merge.
    pub branch: String,
    /// Short title.
    pub title: String,
    /// Optional long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Aggregate status.
    #[serde(default)]
    pub status: PrStatus,
    /// The change set, in submission order.
    #[serde(default)]
    pub changes: Vec<Change>,
    /// Reviewer entries, unique by user.
    #[serde(default)]
    pub reviewers: Vec<Reviewer>,
    /// Comment trail.
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Who merged it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_by: Option<UserId>,
    /// When it was merged (Unix ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<u64>,
    /// Creation time (Unix ms).
    pub created_at: u64,
    /// Last modification time (Unix ms).
    pub updated_at: u64,
}

impl PullRequest {
    /// Create an `open` pull request with no reviewers or comments.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        id: PullRequestId,
        protocol_id: ProtocolId,
        author_id: UserId,
        branch: impl Into<String>,
        title: impl Into<String>,
        description: Option<String>,
        changes: Vec<Change>,
        now: u64,
    ) -> Self {
        Self {
            id,
            protocol_id,
            author_id,
            branch: branch.into(),
            title: title.into(),
            description,
            status: PrStatus::Open,
            changes,
            reviewers: Vec::new(),
            comments: Vec::new(),
            merged_by: None,
            merged_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add `pending` reviewer entries, skipping users already listed.
    pub fn assign_reviewers<'a>(&mut self, users: impl IntoIterator<Item = &'a UserId>) {
        for user in users {
            if self.reviewer(user).is_none() {
                self.reviewers.push(Reviewer {
                    user_id: user.clone(),
                    status: ReviewStatus::Pending,
                    reviewed_at: None,
                });
            }
        }
    }

    /// The reviewer entry for `user`, if any.
    #[must_use]
    pub fn reviewer(&self, user: &UserId) -> Option<&Reviewer> {
        self.reviewers.iter().find(|r| &r.user_id == user)
    }

    /// `true` if at least one reviewer currently approves.
    #[must_use]
    pub fn has_approval(&self) -> bool {
        self.reviewers
            .iter()
            .any(|r| r.status == ReviewStatus::Approved)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
