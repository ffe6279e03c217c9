//! Directory-of-JSON store.
//!
//! ```text
//! <root>/
//!   protocols/<id>.json        {"revision": N, "record": {...}}
//!   pull-requests/<id>.json
//!   .lock                      held exclusively for the length of a commit
//! ```
//!
//! Every write goes to a uniquely named temp file in the target directory, is
//! fsynced and then renamed over the destination, so readers never see a
//! partial record. Commits from every handle and every process on the same
//! root serialize on an advisory lock over `<root>/.lock`.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use fs2::FileExt as _;
use protoreview_core::{ProtocolId, PullRequestId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{Committed, EntityKind, Revision, Store, StoreError, Stored, WriteSet, check_revision};
use crate::protocol::Protocol;
use crate::pull_request::PullRequest;

const LOCK_FILE: &str = ".lock";

/// A [`Store`] backed by JSON files under one directory.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (without creating) a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Take the store-wide commit lock, blocking until it is free.
    ///
    /// The lock is released when the returned file is dropped.
    fn lock_commits(&self) -> Result<fs::File, StoreError> {
        fs::create_dir_all(&self.root).map_err(io_error(&self.root))?;
        let path = self.root.join(LOCK_FILE);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error(&path))?;
        file.lock_exclusive().map_err(io_error(&path))?;
        Ok(file)
    }

    fn record_path(&self, kind: EntityKind, id: &str) -> Result<PathBuf, StoreError> {
        let safe = !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !safe {
            return Err(StoreError::UnsafeId {
                kind,
                id: id.to_owned(),
            });
        }
        Ok(self.root.join(kind.dir_name()).join(format!("{id}.json")))
    }

    fn read<T: DeserializeOwned>(&self, kind: EntityKind, id: &str) -> Result<Option<Stored<T>>, StoreError> {
        let path = self.record_path(kind, id)?;
        read_envelope(&path)
    }

    fn list<T: DeserializeOwned>(&self, kind: EntityKind) -> Result<Vec<T>, StoreError> {
        let dir = self.root.join(kind.dir_name());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stored) = read_envelope::<T>(&path)?
            {
                out.push(stored.record);
            }
        }
        Ok(out)
    }
}

fn read_envelope<T: DeserializeOwned>(path: &Path) -> Result<Option<Stored<T>>, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_owned(),
                source,
            });
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| StoreError::Corrupt {
            path: path.to_owned(),
            detail: e.to_string(),
        })
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + use<> {
    let path = path.to_owned();
    move |source| StoreError::Io { path, source }
}

/// Write `value` to `path` via a unique temp file, fsync and rename.
fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(StoreError::Serialize)?;

    let dir = path.parent().ok_or_else(|| StoreError::Io {
        path: path.to_owned(),
        source: std::io::Error::other("no parent directory"),
    })?;
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
    tmp.write_all(json.as_bytes()).map_err(io_error(tmp.path()))?;
    tmp.as_file().sync_all().map_err(io_error(tmp.path()))?;
    tmp.persist(path).map_err(|e| io_error(path)(e.error))?;
    debug!(path = %path.display(), "record written");
    Ok(())
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    revision: Revision,
    record: &'a T,
}

impl Store for FileStore {
    fn load_protocol(&self, id: &ProtocolId) -> Result<Stored<Protocol>, StoreError> {
        self.read(EntityKind::Protocol, id.as_str())?
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Protocol,
                id: id.to_string(),
            })
    }

    fn load_pull_request(&self, id: &PullRequestId) -> Result<Stored<PullRequest>, StoreError> {
        self.read(EntityKind::PullRequest, id.as_str())?
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::PullRequest,
                id: id.to_string(),
            })
    }

    fn list_protocols(&self) -> Result<Vec<Protocol>, StoreError> {
        self.list(EntityKind::Protocol)
    }

    fn list_pull_requests(&self, protocol: Option<&ProtocolId>) -> Result<Vec<PullRequest>, StoreError> {
        let mut prs: Vec<PullRequest> = self.list(EntityKind::PullRequest)?;
        if let Some(p) = protocol {
            prs.retain(|pr| &pr.protocol_id == p);
        }
        Ok(prs)
    }

    fn commit(&self, writes: WriteSet) -> Result<Committed, StoreError> {
        let _lock = self.lock_commits()?;

        // Check every guard before the first write.
        let mut planned_protocol = None;
        if let Some(put) = &writes.protocol {
            let id = put.record.id.as_str();
            let path = self.record_path(EntityKind::Protocol, id)?;
            let found = read_envelope::<Protocol>(&path)?.map(|s| s.revision);
            check_revision(EntityKind::Protocol, id, put.expected, found)?;
            planned_protocol = Some((path, Revision::after(put.expected)));
        }
        let mut planned_pr = None;
        if let Some(put) = &writes.pull_request {
            let id = put.record.id.as_str();
            let path = self.record_path(EntityKind::PullRequest, id)?;
            let found = read_envelope::<PullRequest>(&path)?.map(|s| s.revision);
            check_revision(EntityKind::PullRequest, id, put.expected, found)?;
            planned_pr = Some((path, Revision::after(put.expected)));
        }

        let mut committed = Committed::default();
        if let (Some(put), Some((path, revision))) = (&writes.protocol, planned_protocol) {
            write_atomic(
                &path,
                &EnvelopeRef {
                    revision,
                    record: &put.record,
                },
            )?;
            committed.protocol = Some(revision);
        }
        if let (Some(put), Some((path, revision))) = (&writes.pull_request, planned_pr) {
            write_atomic(
                &path,
                &EnvelopeRef {
                    revision,
                    record: &put.record,
                },
            )?;
            committed.pull_request = Some(revision);
        }
        Ok(committed)
    }
}
