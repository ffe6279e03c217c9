//! Review state machine: verdicts, comments and closing.
//!
//! Each function takes the current records and returns the updated pull
//! request without touching storage. Callers persist the result with a
//! single write, so a rejected call leaves nothing half-applied.

use protoreview_core::random_record_id;
use tracing::debug;

use crate::access::{Action, Actor, can_close, can_review};
use crate::error::ReviewError;
use crate::protocol::Protocol;
use crate::pull_request::{Comment, PrStatus, PullRequest, ReviewStatus, Reviewer, Verdict};

/// Derive a pull request's status from its reviewer entries.
///
/// Any `changes_requested` wins. Otherwise a non-empty reviewer list in
/// which everyone approved (the pull request's author counts as approving)
/// yields `approved`. Otherwise the current status is kept.
#[must_use]
pub fn aggregate_status(pr: &PullRequest) -> PrStatus {
    if pr
        .reviewers
        .iter()
        .any(|r| r.status == ReviewStatus::ChangesRequested)
    {
        return PrStatus::ChangesRequested;
    }
    let unanimous = !pr.reviewers.is_empty()
        && pr
            .reviewers
            .iter()
            .all(|r| r.status == ReviewStatus::Approved || r.user_id == pr.author_id);
    if unanimous {
        PrStatus::Approved
    } else {
        pr.status
    }
}

/// Record `actor`'s verdict and recompute the aggregate status.
///
/// A listed reviewer overwrites their previous verdict. The protocol's
/// author and administrators are added as reviewers on first submission.
///
/// # Errors
/// - [`ReviewError::InvalidState`] if the pull request is merged or closed.
/// - [`ReviewError::Forbidden`] if `actor` is not allowed to review.
pub fn submit_review(
    pr: &PullRequest,
    protocol: &Protocol,
    actor: &Actor,
    verdict: Verdict,
    now: u64,
) -> Result<PullRequest, ReviewError> {
    if pr.status.is_terminal() {
        return Err(ReviewError::invalid_state(
            &pr.id,
            pr.status,
            "reviews are closed",
        ));
    }
    if !can_review(actor, protocol, pr) {
        return Err(ReviewError::Forbidden {
            actor: actor.id.clone(),
            action: Action::Review,
        });
    }

    let mut next = pr.clone();
    let status = ReviewStatus::from(verdict);
    match next.reviewers.iter_mut().find(|r| r.user_id == actor.id) {
        Some(entry) => {
            entry.status = status;
            entry.reviewed_at = Some(now);
        }
        None => next.reviewers.push(Reviewer {
            user_id: actor.id.clone(),
            status,
            reviewed_at: Some(now),
        }),
    }

    let aggregate = aggregate_status(&next);
    debug_assert!(next.status.can_transition_to(&aggregate));
    debug!(
        pr = %next.id,
        reviewer = %actor.id,
        %verdict,
        from = %next.status,
        to = %aggregate,
        "review aggregated"
    );
    next.status = aggregate;
    next.updated_at = now;
    Ok(next)
}

/// Append a comment. Allowed in every status, including terminal ones.
///
/// # Errors
/// Returns [`ReviewError::Validation`] if `text` is blank.
pub fn add_comment(
    pr: &PullRequest,
    actor: &Actor,
    text: &str,
    path: Option<String>,
    now: u64,
) -> Result<(PullRequest, Comment), ReviewError> {
    if text.trim().is_empty() {
        return Err(ReviewError::validation("comment text must not be blank"));
    }
    let comment = Comment {
        id: random_record_id(),
        author_id: actor.id.clone(),
        text: text.to_owned(),
        path: path.filter(|p| !p.is_empty()),
        created_at: now,
    };
    let mut next = pr.clone();
    next.comments.push(comment.clone());
    next.updated_at = now;
    Ok((next, comment))
}

/// Close a pull request without merging.
///
/// # Errors
/// - [`ReviewError::InvalidState`] if it is already merged or closed.
/// - [`ReviewError::Forbidden`] unless `actor` authored the pull request or
///   the protocol, or is an administrator.
pub fn close(
    pr: &PullRequest,
    protocol: &Protocol,
    actor: &Actor,
    now: u64,
) -> Result<PullRequest, ReviewError> {
    if !pr.status.can_transition_to(&PrStatus::Closed) {
        return Err(ReviewError::invalid_state(&pr.id, pr.status, "already finished"));
    }
    if !can_close(actor, protocol, pr) {
        return Err(ReviewError::Forbidden {
            actor: actor.id.clone(),
            action: Action::Close,
        });
    }
    let mut next = pr.clone();
    next.status = PrStatus::Closed;
    next.updated_at = now;
    Ok(next)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
