//! Pure domain logic for protocol change management.
//!
//! Everything in this crate is synchronous and free of I/O: the step model,
//! the closed [`Change`] type, the diff engine and the patch engine. The
//! review workflow, persistence and CLI live in the `protoreview` crate and
//! build on these types.

pub mod diff;
pub mod model;
pub mod patch;

pub use diff::compute_step_diff;
pub use model::change::{Change, ChangeSetError, ChangeSummary, validate_changes};
pub use model::step::{Step, StepError, renumber};
pub use model::types::{ProtocolId, PullRequestId, StepId, UserId, ValidationError, random_record_id};
pub use patch::{
    PatchConflict, PatchMode, PatchOutcome, SkipReason, SkippedChange, apply_changes, apply_pr_changes,
};
