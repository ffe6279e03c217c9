//! Error types for protocol review operations.
//!
//! Defines [`ReviewError`], the unified error type returned by every
//! [`ReviewDesk`](crate::service::ReviewDesk) operation. Every error is
//! detected before any mutation is persisted, so receiving one means the
//! stored state is unchanged. Messages say what went wrong and how to fix it.

use std::fmt;
use std::path::PathBuf;

use protoreview_core::{ChangeSetError, PatchConflict, PullRequestId, StepError, UserId, ValidationError};

use crate::access::Action;
use crate::pull_request::PrStatus;
use crate::store::{EntityKind, Revision, StoreError};

// ---------------------------------------------------------------------------
// ReviewError
// ---------------------------------------------------------------------------

/// Unified error type for review, merge and version operations.
#[derive(Debug)]
pub enum ReviewError {
    /// A protocol or pull request id does not resolve.
    NotFound {
        /// Which kind of record was looked up.
        kind: EntityKind,
        /// The id that was not found.
        id: String,
    },

    /// The actor lacks the role or ownership the action requires.
    Forbidden {
        /// Who attempted the action.
        actor: UserId,
        /// What they attempted.
        action: Action,
    },

    /// The pull request's status does not allow the action.
    InvalidState {
        /// The pull request.
        id: PullRequestId,
        /// Its status at the time of the attempt.
        status: PrStatus,
        /// Which precondition failed.
        reason: String,
    },

    /// Malformed input: missing step fields, duplicate ids, bad indexes.
    Validation {
        /// Human-readable description of the problem.
        detail: String,
    },

    /// Strict-mode merge found changes that no longer fit the protocol.
    Conflict(PatchConflict),

    /// Another writer saved the record after it was loaded.
    StaleRevision {
        /// Which kind of record.
        kind: EntityKind,
        /// The record id.
        id: String,
        /// The revision this writer loaded (`None`: expected a new record).
        expected: Option<Revision>,
        /// The revision found at save time (`None`: record is gone).
        found: Option<Revision>,
    },

    /// The persistence layer failed (I/O, encoding).
    Store(StoreError),

    /// The configuration file could not be loaded or parsed.
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },
}

impl ReviewError {
    /// Shorthand for a validation failure.
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation {
            detail: detail.into(),
        }
    }

    /// Shorthand for a status precondition failure.
    pub fn invalid_state(id: &PullRequestId, status: PrStatus, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            id: id.clone(),
            status,
            reason: reason.into(),
        }
    }

    /// A stable, lowercase name for the error class, used in JSON output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::InvalidState { .. } => "invalid_state",
            Self::Validation { .. } => "validation_error",
            Self::Conflict(_) => "conflict",
            Self::StaleRevision { .. } => "stale_revision",
            Self::Store(_) => "store_error",
            Self::Config { .. } => "config_error",
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

fn fmt_revision(rev: Option<Revision>) -> String {
    rev.map_or_else(|| "none".to_owned(), |r| r.to_string())
}

impl fmt::Display for ReviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, id } => {
                write!(
                    f,
                    "{kind} '{id}' not found.\n  To fix: check the id, e.g. with:\n    protoreview {} list",
                    kind.cli_noun()
                )
            }
            Self::Forbidden { actor, action } => {
                write!(
                    f,
                    "user '{actor}' may not {action}.\n  To fix: {}",
                    action.who_may()
                )
            }
            Self::InvalidState { id, status, reason } => {
                write!(f, "pull request '{id}' is {status}: {reason}")
            }
            Self::Validation { detail } => {
                write!(f, "invalid input: {detail}")
            }
            Self::Conflict(conflict) => {
                write!(
                    f,
                    "merge refused: {conflict}\n  To fix: rebuild the change set against the protocol's current steps, or set patch_mode = \"lenient\"."
                )
            }
            Self::StaleRevision {
                kind,
                id,
                expected,
                found,
            } => {
                write!(
                    f,
                    "{kind} '{id}' was modified concurrently (loaded revision {}, found {}).\n  To fix: reload and retry the operation.",
                    fmt_revision(*expected),
                    fmt_revision(*found)
                )
            }
            Self::Store(e) => write!(f, "storage failure: {e}"),
            Self::Config { path, detail } => {
                write!(
                    f,
                    "config error in {}: {detail}\n  To fix: check the file syntax and valid options.",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for ReviewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Conflict(e) => Some(e),
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<StoreError> for ReviewError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            StoreError::RevisionMismatch {
                kind,
                id,
                expected,
                found,
            } => Self::StaleRevision {
                kind,
                id,
                expected,
                found,
            },
            other => Self::Store(other),
        }
    }
}

impl From<PatchConflict> for ReviewError {
    fn from(e: PatchConflict) -> Self {
        Self::Conflict(e)
    }
}

impl From<ChangeSetError> for ReviewError {
    fn from(e: ChangeSetError) -> Self {
        Self::validation(e.to_string())
    }
}

impl From<StepError> for ReviewError {
    fn from(e: StepError) -> Self {
        Self::validation(e.to_string())
    }
}

impl From<ValidationError> for ReviewError {
    fn from(e: ValidationError) -> Self {
        Self::validation(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
