//! Change-set computation between two step lists.
//!
//! # Overview
//!
//! [`compute_step_diff`] matches steps by id only:
//!
//! 1. Every old step whose id is absent from the new list becomes a
//!    [`Change::Delete`], in old-list order.
//! 2. Every new step, in new-list order, becomes a [`Change::Add`] if its id
//!    is absent from the old list, or a [`Change::Edit`] if the matched pair
//!    differs in any field (an order-only move included).
//!
//! Output is the deletions followed by the adds and edits. Equality is
//! exact: no fuzzy matching and no move detection beyond identity-by-id.
//!
//! ```text
//! old: [s1 "Mix"]            new: [s1 "Mix well", s2 "Incubate"]
//! diff → [Edit s1, Add s2]
//! ```

use std::collections::HashMap;

use crate::model::change::Change;
use crate::model::step::Step;
use crate::model::types::StepId;

/// Compute the change set that turns `old_steps` into `new_steps`.
///
/// Runs in O(n + m). If an id repeats within one side, the last occurrence
/// wins for lookups on that side.
#[must_use]
pub fn compute_step_diff(old_steps: &[Step], new_steps: &[Step]) -> Vec<Change> {
    let old_by_id: HashMap<&StepId, &Step> = old_steps.iter().map(|s| (&s.id, s)).collect();
    let new_by_id: HashMap<&StepId, &Step> = new_steps.iter().map(|s| (&s.id, s)).collect();

    let deletes = old_steps
        .iter()
        .filter(|old| !new_by_id.contains_key(&old.id))
        .map(|old| Change::Delete {
            step_id: old.id.clone(),
            old_step: old.clone(),
        });

    let adds_and_edits = new_steps.iter().filter_map(|new| match old_by_id.get(&new.id) {
        None => Some(Change::Add { step: new.clone() }),
        Some(old) if old.differs_from(new) => Some(Change::Edit {
            step_id: new.id.clone(),
            new_step: new.clone(),
            old_step: (*old).clone(),
        }),
        Some(_) => None,
    });

    deletes.chain(adds_and_edits).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
