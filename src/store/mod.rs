//! Persistence behind a narrow load/commit interface.
//!
//! Every stored record carries a [`Revision`]. A [`WriteSet`] names the
//! revision each record was loaded at; [`Store::commit`] checks all of them
//! before writing anything, so a concurrent writer surfaces as
//! [`StoreError::RevisionMismatch`] instead of a lost update.

mod file;
mod memory;

use std::fmt;
use std::path::PathBuf;

use protoreview_core::{ProtocolId, PullRequestId};
use serde::{Deserialize, Serialize};

use crate::protocol::Protocol;
use crate::pull_request::PullRequest;

pub use file::FileStore;
pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// EntityKind / Revision
// ---------------------------------------------------------------------------

/// The two record kinds the store holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A [`Protocol`].
    Protocol,
    /// A [`PullRequest`].
    PullRequest,
}

impl EntityKind {
    /// The CLI subcommand that manages this kind.
    #[must_use]
    pub const fn cli_noun(self) -> &'static str {
        match self {
            Self::Protocol => "protocol",
            Self::PullRequest => "pr",
        }
    }

    /// Directory name used by [`FileStore`].
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Protocol => "protocols",
            Self::PullRequest => "pull-requests",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol => write!(f, "protocol"),
            Self::PullRequest => write!(f, "pull request"),
        }
    }
}

/// Optimistic concurrency token. Starts at 1 and grows by one per write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// Revision of a freshly created record.
    pub const FIRST: Self = Self(1);

    /// Wrap a raw revision number.
    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// The raw number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The revision a successful write produces.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Revision after writing over `previous` (`None`: new record).
    #[must_use]
    pub fn after(previous: Option<Self>) -> Self {
        previous.map_or(Self::FIRST, Self::next)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Stored records and write sets
// ---------------------------------------------------------------------------

/// A record together with the revision it was read at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stored<T> {
    /// Revision at load time.
    pub revision: Revision,
    /// The record.
    pub record: T,
}

/// One guarded write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Put<T> {
    /// The full new record.
    pub record: T,
    /// Revision the writer loaded, or `None` if the record must not exist.
    pub expected: Option<Revision>,
}

/// Up to one protocol and one pull request, committed together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSet {
    /// Protocol write, if any.
    pub protocol: Option<Put<Protocol>>,
    /// Pull request write, if any.
    pub pull_request: Option<Put<PullRequest>>,
}

impl WriteSet {
    /// An empty write set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a protocol write.
    #[must_use]
    pub fn protocol(mut self, record: Protocol, expected: Option<Revision>) -> Self {
        self.protocol = Some(Put { record, expected });
        self
    }

    /// Add a pull request write.
    #[must_use]
    pub fn pull_request(mut self, record: PullRequest, expected: Option<Revision>) -> Self {
        self.pull_request = Some(Put { record, expected });
        self
    }

    /// `true` if there is nothing to write.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.protocol.is_none() && self.pull_request.is_none()
    }
}

/// Revisions assigned by a successful commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Committed {
    /// New protocol revision, if a protocol was written.
    pub protocol: Option<Revision>,
    /// New pull request revision, if one was written.
    pub pull_request: Option<Revision>,
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Failures of the persistence layer.
#[derive(Debug)]
pub enum StoreError {
    /// No record with this id.
    NotFound {
        /// Record kind.
        kind: EntityKind,
        /// The id that was looked up.
        id: String,
    },
    /// The stored revision differs from the one the writer loaded.
    RevisionMismatch {
        /// Record kind.
        kind: EntityKind,
        /// Record id.
        id: String,
        /// What the writer expected.
        expected: Option<Revision>,
        /// What the store holds.
        found: Option<Revision>,
    },
    /// Filesystem failure.
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// A stored file could not be decoded.
    Corrupt {
        /// The offending file.
        path: PathBuf,
        /// Decoder message.
        detail: String,
    },
    /// A record could not be encoded.
    Serialize(serde_json::Error),
    /// The id cannot be used as a file name.
    UnsafeId {
        /// Record kind.
        kind: EntityKind,
        /// The rejected id.
        id: String,
    },
}

fn show(rev: Option<Revision>) -> String {
    rev.map_or_else(|| "none".to_owned(), |r| r.to_string())
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} '{id}' not found"),
            Self::RevisionMismatch {
                kind,
                id,
                expected,
                found,
            } => write!(
                f,
                "{kind} '{id}': expected revision {}, found {}",
                show(*expected),
                show(*found)
            ),
            Self::Io { path, source } => write!(f, "I/O error at {}: {source}", path.display()),
            Self::Corrupt { path, detail } => {
                write!(f, "corrupt record {}: {detail}", path.display())
            }
            Self::Serialize(e) => write!(f, "failed to encode record: {e}"),
            Self::UnsafeId { kind, id } => write!(
                f,
                "{kind} id '{id}' cannot be stored on disk (use letters, digits, '-', '_' or '.')"
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialize(e) => Some(e),
            _ => None,
        }
    }
}

/// Compare a writer's expected revision with the stored one.
fn check_revision(
    kind: EntityKind,
    id: &str,
    expected: Option<Revision>,
    found: Option<Revision>,
) -> Result<(), StoreError> {
    if expected == found {
        Ok(())
    } else {
        Err(StoreError::RevisionMismatch {
            kind,
            id: id.to_owned(),
            expected,
            found,
        })
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// The persistence collaborator.
pub trait Store: Send + Sync {
    /// Load a protocol.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if absent; I/O or decode errors otherwise.
    fn load_protocol(&self, id: &ProtocolId) -> Result<Stored<Protocol>, StoreError>;

    /// Load a pull request.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if absent; I/O or decode errors otherwise.
    fn load_pull_request(&self, id: &PullRequestId) -> Result<Stored<PullRequest>, StoreError>;

    /// All protocols, in no particular order.
    ///
    /// # Errors
    /// I/O or decode errors.
    fn list_protocols(&self) -> Result<Vec<Protocol>, StoreError>;

    /// Pull requests, optionally only those targeting `protocol`, in no
    /// particular order.
    ///
    /// # Errors
    /// I/O or decode errors.
    fn list_pull_requests(&self, protocol: Option<&ProtocolId>) -> Result<Vec<PullRequest>, StoreError>;

    /// Check every revision in `writes`, then write every record.
    ///
    /// # Errors
    /// [`StoreError::RevisionMismatch`] if any guard fails, in which case
    /// nothing was written; I/O errors otherwise.
    fn commit(&self, writes: WriteSet) -> Result<Committed, StoreError>;
}
