//! The change model: one add, edit, or delete targeting one step by id.
//!
//! A change set is an unordered `Vec<Change>`, produced by the diff engine or
//! authored directly by a client. The type is closed so patch application is
//! exhaustively handled at compile time.
//!
//! Serialized with a `"type"` tag for wire compatibility:
//! `{"type":"edit","stepId":"s1","step":{…},"oldStep":{…}}` etc.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::step::{Step, StepError};
use super::types::StepId;

// ---------------------------------------------------------------------------
// Change
// ---------------------------------------------------------------------------

/// A single step-level operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    /// A step that did not exist before.
    Add {
        /// The new step. Its `order` is the requested insertion position.
        step: Step,
    },
    /// A step whose record was replaced.
    Edit {
        /// The step being edited.
        #[serde(rename = "stepId")]
        step_id: StepId,
        /// The full replacement record.
        #[serde(rename = "step", alias = "newStep")]
        new_step: Step,
        /// The record as it was when the change was authored.
        #[serde(rename = "oldStep")]
        old_step: Step,
    },
    /// A step that was removed.
    Delete {
        /// The step being removed.
        #[serde(rename = "stepId")]
        step_id: StepId,
        /// The record as it was when the change was authored.
        #[serde(rename = "oldStep")]
        old_step: Step,
    },
}

impl Change {
    /// The id this change acts on.
    #[must_use]
    pub const fn target_id(&self) -> &StepId {
        match self {
            Self::Add { step } => &step.id,
            Self::Edit { step_id, .. } | Self::Delete { step_id, .. } => step_id,
        }
    }

    /// Sort key used by the patch engine: the incoming step's order for
    /// adds and edits, the removed step's old order for deletes.
    #[must_use]
    pub const fn anchor(&self) -> u32 {
        match self {
            Self::Add { step } | Self::Edit { new_step: step, .. } => step.order,
            Self::Delete { old_step, .. } => old_step.order,
        }
    }

    /// Short lowercase name of the variant, as used on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Edit { .. } => "edit",
            Self::Delete { .. } => "delete",
        }
    }

    fn carried_steps(&self) -> impl Iterator<Item = &Step> {
        let (first, second) = match self {
            Self::Add { step } => (step, None),
            Self::Edit {
                new_step, old_step, ..
            } => (new_step, Some(old_step)),
            Self::Delete { old_step, .. } => (old_step, None),
        };
        std::iter::once(first).chain(second)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { step } => write!(f, "+ [{}] {} (at {})", step.id, step.title, step.order),
            Self::Edit {
                step_id,
                new_step,
                old_step,
            } => {
                if old_step.title == new_step.title {
                    write!(f, "~ [{step_id}] {}", new_step.title)
                } else {
                    write!(f, "~ [{step_id}] {} -> {}", old_step.title, new_step.title)
                }
            }
            Self::Delete { step_id, old_step } => write!(f, "- [{step_id}] {}", old_step.title),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A malformed change set, rejected before any patching happens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeSetError {
    /// A step carried by a change is missing a required field.
    InvalidStep {
        /// Index of the change in the submitted set.
        index: usize,
        /// What is wrong with the step.
        error: StepError,
    },
    /// An edit whose replacement record carries a different id.
    MismatchedEditId {
        /// Index of the change in the submitted set.
        index: usize,
        /// The id named by `stepId`.
        step_id: StepId,
        /// The id carried by the replacement record.
        new_id: StepId,
    },
    /// Two changes target the same step.
    DuplicateTarget {
        /// The step targeted more than once.
        step_id: StepId,
        /// Indexes of the first and the repeated change.
        indexes: (usize, usize),
    },
}

impl fmt::Display for ChangeSetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStep { index, error } => write!(f, "change #{index}: {error}"),
            Self::MismatchedEditId {
                index,
                step_id,
                new_id,
            } => write!(
                f,
                "change #{index}: edit of '{step_id}' carries a record with id '{new_id}'"
            ),
            Self::DuplicateTarget { step_id, indexes } => write!(
                f,
                "changes #{} and #{} both target step '{step_id}'",
                indexes.0, indexes.1
            ),
        }
    }
}

impl std::error::Error for ChangeSetError {}

/// Check a change set for missing step fields, id mismatches, and duplicate
/// targets.
///
/// # Errors
/// Returns the first problem found, scanning in submission order.
pub fn validate_changes(changes: &[Change]) -> Result<(), ChangeSetError> {
    let mut seen: BTreeMap<&StepId, usize> = BTreeMap::new();
    for (index, change) in changes.iter().enumerate() {
        for step in change.carried_steps() {
            step.validate()
                .map_err(|error| ChangeSetError::InvalidStep { index, error })?;
        }
        if let Change::Edit {
            step_id, new_step, ..
        } = change
            && new_step.id != *step_id
        {
            return Err(ChangeSetError::MismatchedEditId {
                index,
                step_id: step_id.clone(),
                new_id: new_step.id.clone(),
            });
        }
        if let Some(&first) = seen.get(change.target_id()) {
            return Err(ChangeSetError::DuplicateTarget {
                step_id: change.target_id().clone(),
                indexes: (first, index),
            });
        }
        seen.insert(change.target_id(), index);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ChangeSummary
// ---------------------------------------------------------------------------

/// Counts per change kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Number of `Add` changes.
    pub added: usize,
    /// Number of `Edit` changes.
    pub edited: usize,
    /// Number of `Delete` changes.
    pub deleted: usize,
}

impl ChangeSummary {
    /// Tally a change set.
    #[must_use]
    pub fn of(changes: &[Change]) -> Self {
        changes.iter().fold(Self::default(), |mut acc, change| {
            match change {
                Change::Add { .. } => acc.added += 1,
                Change::Edit { .. } => acc.edited += 1,
                Change::Delete { .. } => acc.deleted += 1,
            }
            acc
        })
    }

    /// Total number of changes.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.added + self.edited + self.deleted
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} edited, {} deleted",
            self.added, self.edited, self.deleted
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
