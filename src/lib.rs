//! protoreview library crate.
//!
//! Pull-request style change management for experimental protocols: review
//! verdicts, merges, version snapshots and the branch ledger, on top of the
//! pure diff/patch engines in `protoreview-core`. The `protoreview` binary
//! is a thin CLI over [`service::ReviewDesk`]; integration tests drive the
//! same API with a [`store::MemoryStore`].

pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod merge;
pub mod protocol;
pub mod pull_request;
pub mod review;
pub mod service;
pub mod store;

pub use protoreview_core::{
    Change, ChangeSummary, PatchMode, ProtocolId, PullRequestId, Step, StepId, UserId, apply_changes,
    apply_pr_changes, compute_step_diff,
};

// Private modules only used by the binary: cli, format, telemetry.
