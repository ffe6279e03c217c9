//! Patch engine: apply a change set to a step list.
//!
//! The change set need not be the exact output of
//! [`compute_step_diff`](crate::diff::compute_step_diff); clients may author
//! changes by hand. Application is pure and deterministic.
//!
//! # Algorithm
//!
//! 1. Clone the current list into a working list.
//! 2. Stable-sort the changes by [`Change::anchor`].
//! 3. Apply each change:
//!    - `Add`: insert before the first working step whose `order` is at
//!      least the new step's `order`, else append.
//!    - `Edit`: replace the record at the target's position.
//!    - `Delete`: remove the target (by `stepId`, falling back to
//!      `oldStep.id`).
//! 4. Renumber every step to its final 1-based position. This pass overrides
//!    any `order` carried by individual changes.
//!
//! A change whose target is missing (or an add whose id is already present)
//! cannot be applied. [`PatchMode`] decides what happens then.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::change::Change;
use crate::model::step::{Step, renumber};
use crate::model::types::StepId;

// ---------------------------------------------------------------------------
// PatchMode
// ---------------------------------------------------------------------------

/// How to treat changes that no longer fit the current list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    /// Skip inapplicable changes and report them in [`PatchOutcome::skipped`].
    #[default]
    Lenient,
    /// Refuse the whole change set with a [`PatchConflict`].
    Strict,
}

impl fmt::Display for PatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lenient => write!(f, "lenient"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Why a change was not applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// An edit or delete whose target id is not in the list.
    MissingTarget,
    /// An add whose id is already in the list.
    DuplicateId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTarget => write!(f, "target step no longer exists"),
            Self::DuplicateId => write!(f, "step id already exists"),
        }
    }
}

/// A change the engine could not apply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedChange {
    /// `"add"`, `"edit"` or `"delete"`.
    pub kind: String,
    /// The step the change targeted.
    pub step_id: StepId,
    /// Why it was skipped.
    pub reason: SkipReason,
}

impl fmt::Display for SkippedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of '{}': {}", self.kind, self.step_id, self.reason)
    }
}

/// The result of applying a change set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchOutcome {
    /// The new, densely renumbered step list.
    pub steps: Vec<Step>,
    /// Changes that were not applied (always empty in strict mode).
    pub skipped: Vec<SkippedChange>,
}

impl PatchOutcome {
    /// `true` if every change was applied.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Strict-mode refusal: the change set does not fit the current list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchConflict {
    /// Every change that could not be applied.
    pub conflicts: Vec<SkippedChange>,
}

impl fmt::Display for PatchConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} change(s) do not apply to the current steps",
            self.conflicts.len()
        )?;
        for c in &self.conflicts {
            write!(f, "\n  - {c}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PatchConflict {}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Apply `changes` to `current` leniently and return only the new list.
///
/// Inapplicable changes are skipped without a trace; use [`apply_changes`]
/// to see them.
#[must_use]
pub fn apply_pr_changes(current: &[Step], changes: &[Change]) -> Vec<Step> {
    let mut working = current.to_vec();
    apply_in_place(&mut working, changes, &mut Vec::new());
    renumber(&mut working);
    working
}

/// Apply `changes` to `current` under the given mode.
///
/// # Errors
/// In [`PatchMode::Strict`], returns [`PatchConflict`] listing every change
/// that could not be applied. Lenient mode never fails.
pub fn apply_changes(
    current: &[Step],
    changes: &[Change],
    mode: PatchMode,
) -> Result<PatchOutcome, PatchConflict> {
    let mut working = current.to_vec();
    let mut skipped = Vec::new();
    apply_in_place(&mut working, changes, &mut skipped);

    if mode == PatchMode::Strict && !skipped.is_empty() {
        return Err(PatchConflict { conflicts: skipped });
    }
    for s in &skipped {
        tracing::debug!(kind = %s.kind, step = %s.step_id, reason = %s.reason, "change skipped");
    }

    renumber(&mut working);
    Ok(PatchOutcome {
        steps: working,
        skipped,
    })
}

fn apply_in_place(working: &mut Vec<Step>, changes: &[Change], skipped: &mut Vec<SkippedChange>) {
    let mut sorted: Vec<&Change> = changes.iter().collect();
    // `sort_by_key` is stable: ties keep submission order.
    sorted.sort_by_key(|c| c.anchor());

    for change in sorted {
        let applied = match change {
            Change::Add { step } => {
                if position_of(working, &step.id).is_some() {
                    Err(SkipReason::DuplicateId)
                } else {
                    let at = working
                        .iter()
                        .position(|s| s.order >= step.order)
                        .unwrap_or(working.len());
                    working.insert(at, step.clone());
                    Ok(())
                }
            }
            Change::Edit {
                step_id, new_step, ..
            } => position_of(working, step_id)
                .map(|at| working[at] = new_step.clone())
                .ok_or(SkipReason::MissingTarget),
            Change::Delete { step_id, old_step } => position_of(working, step_id)
                .or_else(|| position_of(working, &old_step.id))
                .map(|at| {
                    working.remove(at);
                })
                .ok_or(SkipReason::MissingTarget),
        };
        if let Err(reason) = applied {
            skipped.push(SkippedChange {
                kind: change.kind().to_owned(),
                step_id: change.target_id().clone(),
                reason,
            });
        }
    }
}

fn position_of(steps: &[Step], id: &StepId) -> Option<usize> {
    steps.iter().position(|s| &s.id == id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------
