//! In-memory store for tests and embedders.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use protoreview_core::{ProtocolId, PullRequestId};

use super::{Committed, EntityKind, Revision, Store, StoreError, Stored, WriteSet, check_revision};
use crate::protocol::Protocol;
use crate::pull_request::PullRequest;

#[derive(Debug, Default)]
struct Tables {
    protocols: BTreeMap<ProtocolId, Stored<Protocol>>,
    pull_requests: BTreeMap<PullRequestId, Stored<PullRequest>>,
}

/// A [`Store`] holding everything in a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn load_protocol(&self, id: &ProtocolId) -> Result<Stored<Protocol>, StoreError> {
        self.tables()
            .protocols
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Protocol,
                id: id.to_string(),
            })
    }

    fn load_pull_request(&self, id: &PullRequestId) -> Result<Stored<PullRequest>, StoreError> {
        self.tables()
            .pull_requests
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::PullRequest,
                id: id.to_string(),
            })
    }

    fn list_protocols(&self) -> Result<Vec<Protocol>, StoreError> {
        Ok(self
            .tables()
            .protocols
            .values()
            .map(|s| s.record.clone())
            .collect())
    }

    fn list_pull_requests(&self, protocol: Option<&ProtocolId>) -> Result<Vec<PullRequest>, StoreError> {
        Ok(self
            .tables()
            .pull_requests
            .values()
            .filter(|s| protocol.is_none_or(|p| &s.record.protocol_id == p))
            .map(|s| s.record.clone())
            .collect())
    }

    fn commit(&self, writes: WriteSet) -> Result<Committed, StoreError> {
        let mut tables = self.tables();

        if let Some(put) = &writes.protocol {
            let found = tables.protocols.get(&put.record.id).map(|s| s.revision);
            check_revision(EntityKind::Protocol, put.record.id.as_str(), put.expected, found)?;
        }
        if let Some(put) = &writes.pull_request {
            let found = tables.pull_requests.get(&put.record.id).map(|s| s.revision);
            check_revision(EntityKind::PullRequest, put.record.id.as_str(), put.expected, found)?;
        }

        let mut committed = Committed::default();
        if let Some(put) = writes.protocol {
            let revision = Revision::after(put.expected);
            tables.protocols.insert(
                put.record.id.clone(),
                Stored {
                    revision,
                    record: put.record,
                },
            );
            committed.protocol = Some(revision);
        }
        if let Some(put) = writes.pull_request {
            let revision = Revision::after(put.expected);
            tables.pull_requests.insert(
                put.record.id.clone(),
                Stored {
                    revision,
                    record: put.record,
                },
            );
            committed.pull_request = Some(revision);
        }
        Ok(committed)
    }
}
