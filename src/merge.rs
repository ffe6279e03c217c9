//! Merge action: apply a pull request to its protocol.
//!
//! [`plan_merge`] runs the guards, patches the steps, snapshots the prior
//! version and records the branch, all on copies. Nothing is persisted here;
//! the caller commits the returned protocol and pull request together.

use protoreview_core::{ChangeSummary, PatchMode, SkippedChange, UserId, apply_changes};
use serde::Serialize;
use tracing::warn;

use crate::access::{Action, Actor, can_merge};
use crate::error::ReviewError;
use crate::protocol::Protocol;
use crate::pull_request::{PrStatus, PullRequest};

/// Knobs that shape a merge, taken from `[merge]` in the config file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergePolicy {
    /// Require at least one approving reviewer when reviewers are assigned.
    pub require_approval: bool,
    /// How to treat stale change targets.
    pub patch_mode: PatchMode,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            require_approval: true,
            patch_mode: PatchMode::Lenient,
        }
    }
}

/// What a merge did, for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Version before the merge (now the newest snapshot).
    pub from_version: u32,
    /// Version after the merge.
    pub to_version: u32,
    /// Branch the protocol now tracks.
    pub branch: String,
    /// `true` if this merge added a branch ledger entry.
    pub branch_created: bool,
    /// Change counts.
    pub summary: ChangeSummary,
    /// Changes that were not applied (lenient mode only).
    pub skipped: Vec<SkippedChange>,
    /// Who merged.
    pub merged_by: UserId,
}

/// The records a merge produces.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    /// The protocol with new steps, version and branch.
    pub protocol: Protocol,
    /// The pull request, now `merged`.
    pub pull_request: PullRequest,
    /// Summary of the merge.
    pub report: MergeReport,
}

/// Compute the result of merging `pr` into `protocol`.
///
/// # Errors
/// - [`ReviewError::InvalidState`] if the pull request is merged or closed,
///   or if approval is required and no reviewer approved.
/// - [`ReviewError::Forbidden`] unless `actor` authored the protocol or the
///   pull request, or is an administrator.
/// - [`ReviewError::Conflict`] in strict mode when a change does not apply.
pub fn plan_merge(
    protocol: &Protocol,
    pr: &PullRequest,
    actor: &Actor,
    policy: MergePolicy,
    now: u64,
) -> Result<MergeOutcome, ReviewError> {
    if !pr.status.can_transition_to(&PrStatus::Merged) {
        return Err(ReviewError::invalid_state(&pr.id, pr.status, "cannot be merged again"));
    }
    if !can_merge(actor, protocol, pr) {
        return Err(ReviewError::Forbidden {
            actor: actor.id.clone(),
            action: Action::Merge,
        });
    }
    if policy.require_approval && !pr.reviewers.is_empty() && !pr.has_approval() {
        return Err(ReviewError::invalid_state(
            &pr.id,
            pr.status,
            "merge requires approval from at least one reviewer",
        ));
    }

    let patched = apply_changes(&protocol.steps, &pr.changes, policy.patch_mode)?;
    for skipped in &patched.skipped {
        warn!(pr = %pr.id, protocol = %protocol.id, %skipped, "change skipped during merge");
    }

    let mut next = protocol.clone();
    let from_version = next.current_version;
    next.begin_version(&actor.id, now);
    next.steps = patched.steps;
    if !pr.branch.is_empty() {
        next.current_branch.clone_from(&pr.branch);
    }
    let branch_created = next.record_branch(&pr.branch, &pr.author_id, next.current_version - 1, now);
    next.updated_at = now;

    let mut merged = pr.clone();
    merged.status = PrStatus::Merged;
    merged.merged_by = Some(actor.id.clone());
    merged.merged_at = Some(now);
    merged.updated_at = now;

    let report = MergeReport {
        from_version,
        to_version: next.current_version,
        branch: next.current_branch.clone(),
        branch_created,
        summary: ChangeSummary::of(&pr.changes),
        skipped: patched.skipped,
        merged_by: actor.id.clone(),
    };
    Ok(MergeOutcome {
        protocol: next,
        pull_request: merged,
        report,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
