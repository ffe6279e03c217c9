//! The review desk: every protocol and pull request operation.
//!
//! Each operation follows the same shape:
//!
//! 1. take the per-protocol lock,
//! 2. load the records it needs, remembering their revisions,
//! 3. authorise and validate,
//! 4. compute the complete new records in memory,
//! 5. issue one [`Store::commit`] guarded by the loaded revisions.
//!
//! A rejected operation returns before step 5, so the store is unchanged.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use protoreview_core::{Change, ProtocolId, PullRequestId, Step, UserId, validate_changes};
use tracing::instrument;

use crate::access::{
    Action, Actor, can_comment, can_create_pull_request, can_edit_protocol, can_view_protocol,
};
use crate::clock::Clock;
use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::merge::{MergeOutcome, plan_merge};
use crate::protocol::{Protocol, ProtocolEdit, VersionComparison, validate_steps};
use crate::pull_request::{Comment, PullRequest, Verdict};
use crate::review;
use crate::store::{Store, WriteSet};

/// Input for [`ReviewDesk::create_protocol`].
#[derive(Clone, Debug, Default)]
pub struct NewProtocol {
    /// Title; must not be blank.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Initial steps; renumbered on creation.
    pub steps: Vec<Step>,
}

/// Input for [`ReviewDesk::create_pull_request`].
#[derive(Clone, Debug)]
pub struct NewPullRequest {
    /// Target protocol.
    pub protocol_id: ProtocolId,
    /// Lineage label recorded on merge.
    pub branch: String,
    /// Title; must not be blank.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// The change set.
    pub changes: Vec<Change>,
    /// Users assigned as `pending` reviewers.
    pub reviewers: Vec<UserId>,
}

/// Protocol and pull request operations over a [`Store`].
pub struct ReviewDesk<S, C> {
    store: S,
    clock: C,
    config: ReviewConfig,
    locks: Mutex<HashMap<ProtocolId, Arc<Mutex<()>>>>,
}

impl<S: Store, C: Clock> ReviewDesk<S, C> {
    /// Create a desk.
    pub fn new(store: S, clock: C, config: ReviewConfig) -> Self {
        Self {
            store,
            clock,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The time source.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// The active configuration.
    pub const fn config(&self) -> &ReviewConfig {
        &self.config
    }

    fn protocol_lock(&self, id: &ProtocolId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    // -----------------------------------------------------------------------
    // Protocols
    // -----------------------------------------------------------------------

    /// Create a draft protocol owned by `actor`.
    ///
    /// # Errors
    /// [`ReviewError::Validation`] for a blank title or malformed steps.
    #[instrument(skip_all, fields(actor = %actor.id))]
    pub fn create_protocol(&self, actor: &Actor, input: NewProtocol) -> Result<Protocol, ReviewError> {
        if input.title.trim().is_empty() {
            return Err(ReviewError::validation("protocol title must not be blank"));
        }
        validate_steps(&input.steps)?;

        let protocol = Protocol::new(
            ProtocolId::random(),
            actor.id.clone(),
            input.title,
            input.description.filter(|d| !d.is_empty()),
            input.steps,
            &self.config.repo.default_branch,
            self.clock.now(),
        );
        self.store
            .commit(WriteSet::new().protocol(protocol.clone(), None))?;
        tracing::info!(protocol = %protocol.id, steps = protocol.steps.len(), "protocol created");
        Ok(protocol)
    }

    /// Read a protocol.
    ///
    /// # Errors
    /// [`ReviewError::NotFound`] or [`ReviewError::Forbidden`].
    pub fn get_protocol(&self, actor: &Actor, id: &ProtocolId) -> Result<Protocol, ReviewError> {
        let protocol = self.store.load_protocol(id)?.record;
        if !can_view_protocol(actor, &protocol) {
            return Err(forbidden(actor, Action::ViewProtocol));
        }
        Ok(protocol)
    }

    /// Protocols `actor` may view, most recently updated first.
    ///
    /// # Errors
    /// Store failures.
    pub fn list_protocols(&self, actor: &Actor) -> Result<Vec<Protocol>, ReviewError> {
        let mut protocols: Vec<Protocol> = self
            .store
            .list_protocols()?
            .into_iter()
            .filter(|p| can_view_protocol(actor, p))
            .collect();
        protocols.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(protocols)
    }

    /// Apply `edit`; with `create_version` the pre-edit state is snapshotted
    /// and the version number bumped.
    ///
    /// # Errors
    /// [`ReviewError::Forbidden`] unless `actor` owns the protocol or is an
    /// administrator; [`ReviewError::Validation`] for an empty or malformed
    /// edit; [`ReviewError::StaleRevision`] on a concurrent write.
    #[instrument(skip_all, fields(actor = %actor.id, protocol = %id, create_version = create_version))]
    pub fn update_protocol(
        &self,
        actor: &Actor,
        id: &ProtocolId,
        edit: ProtocolEdit,
        create_version: bool,
    ) -> Result<Protocol, ReviewError> {
        let lock = self.protocol_lock(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let stored = self.store.load_protocol(id)?;
        if !can_edit_protocol(actor, &stored.record) {
            return Err(forbidden(actor, Action::EditProtocol));
        }
        if edit.is_empty() && !create_version {
            return Err(ReviewError::validation("nothing to change"));
        }

        let now = self.clock.now();
        let mut next = stored.record;
        if create_version {
            next.begin_version(&actor.id, now);
        }
        next.apply_edit(edit, now)?;
        self.store
            .commit(WriteSet::new().protocol(next.clone(), Some(stored.revision)))?;
        tracing::info!(version = next.current_version, "protocol updated");
        Ok(next)
    }

    /// Compare two entries of the protocol's history (oldest first, the
    /// current state last).
    ///
    /// # Errors
    /// [`ReviewError::Forbidden`] unless `actor` owns the protocol or is an
    /// administrator; [`ReviewError::Validation`] for out-of-range indexes.
    pub fn compare_versions(
        &self,
        actor: &Actor,
        id: &ProtocolId,
        left: usize,
        right: usize,
    ) -> Result<VersionComparison, ReviewError> {
        let protocol = self.store.load_protocol(id)?.record;
        if !can_edit_protocol(actor, &protocol) {
            return Err(forbidden(actor, Action::EditProtocol));
        }
        protocol.compare_versions(left, right)
    }

    // -----------------------------------------------------------------------
    // Pull requests
    // -----------------------------------------------------------------------

    /// Open a pull request.
    ///
    /// # Errors
    /// [`ReviewError::NotFound`] for an unknown protocol,
    /// [`ReviewError::Forbidden`] unless `actor` owns it or is an
    /// administrator, [`ReviewError::Validation`] for a blank title or a
    /// malformed change set.
    #[instrument(skip_all, fields(actor = %actor.id, protocol = %input.protocol_id))]
    pub fn create_pull_request(&self, actor: &Actor, input: NewPullRequest) -> Result<PullRequest, ReviewError> {
        let protocol = self.store.load_protocol(&input.protocol_id)?.record;
        if !can_create_pull_request(actor, &protocol) {
            return Err(forbidden(actor, Action::CreatePullRequest));
        }
        if input.title.trim().is_empty() {
            return Err(ReviewError::validation("pull request title must not be blank"));
        }
        validate_changes(&input.changes)?;

        let mut pr = PullRequest::new(
            PullRequestId::random(),
            protocol.id,
            actor.id.clone(),
            input.branch.trim(),
            input.title,
            input.description.filter(|d| !d.is_empty()),
            input.changes,
            self.clock.now(),
        );
        pr.assign_reviewers(&input.reviewers);
        self.store.commit(WriteSet::new().pull_request(pr.clone(), None))?;
        tracing::info!(pr = %pr.id, changes = pr.changes.len(), reviewers = pr.reviewers.len(), "pull request opened");
        Ok(pr)
    }

    /// Read a pull request.
    ///
    /// # Errors
    /// [`ReviewError::NotFound`].
    pub fn get_pull_request(&self, id: &PullRequestId) -> Result<PullRequest, ReviewError> {
        Ok(self.store.load_pull_request(id)?.record)
    }

    /// Pull requests, newest first, capped at `pull_requests.list_limit`.
    ///
    /// # Errors
    /// Store failures.
    pub fn list_pull_requests(&self, protocol: Option<&ProtocolId>) -> Result<Vec<PullRequest>, ReviewError> {
        let mut prs = self.store.list_pull_requests(protocol)?;
        prs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        prs.truncate(self.config.pull_requests.list_limit);
        Ok(prs)
    }

    /// Record `actor`'s verdict.
    ///
    /// # Errors
    /// See [`review::submit_review`], plus [`ReviewError::NotFound`] and
    /// [`ReviewError::StaleRevision`].
    #[instrument(skip_all, fields(actor = %actor.id, pr = %id, %verdict))]
    pub fn submit_review(&self, actor: &Actor, id: &PullRequestId, verdict: Verdict) -> Result<PullRequest, ReviewError> {
        self.with_pull_request(id, |protocol, pr, now| {
            review::submit_review(pr, protocol, actor, verdict, now)
        })
    }

    /// Merge a pull request into its protocol.
    ///
    /// # Errors
    /// See [`plan_merge`], plus [`ReviewError::NotFound`] and
    /// [`ReviewError::StaleRevision`].
    #[instrument(skip_all, fields(actor = %actor.id, pr = %id))]
    pub fn merge(&self, actor: &Actor, id: &PullRequestId) -> Result<MergeOutcome, ReviewError> {
        let protocol_id = self.store.load_pull_request(id)?.record.protocol_id;
        let lock = self.protocol_lock(&protocol_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let pr = self.store.load_pull_request(id)?;
        let protocol = self.store.load_protocol(&protocol_id)?;
        let outcome = plan_merge(
            &protocol.record,
            &pr.record,
            actor,
            self.config.merge.policy(),
            self.clock.now(),
        )?;

        self.store.commit(
            WriteSet::new()
                .protocol(outcome.protocol.clone(), Some(protocol.revision))
                .pull_request(outcome.pull_request.clone(), Some(pr.revision)),
        )?;
        tracing::info!(
            protocol = %protocol_id,
            from = outcome.report.from_version,
            to = outcome.report.to_version,
            branch = %outcome.report.branch,
            skipped = outcome.report.skipped.len(),
            "pull request merged"
        );
        Ok(outcome)
    }

    /// Append a comment. Allowed in every status.
    ///
    /// # Errors
    /// [`ReviewError::Validation`] for blank text, plus
    /// [`ReviewError::NotFound`] and [`ReviewError::StaleRevision`].
    #[instrument(skip_all, fields(actor = %actor.id, pr = %id))]
    pub fn add_comment(
        &self,
        actor: &Actor,
        id: &PullRequestId,
        text: &str,
        path: Option<String>,
    ) -> Result<Comment, ReviewError> {
        let mut added = None;
        self.with_pull_request(id, |protocol, pr, now| {
            if !can_comment(actor, protocol, pr) {
                return Err(forbidden(actor, Action::Comment));
            }
            let (next, comment) = review::add_comment(pr, actor, text, path, now)?;
            added = Some(comment);
            Ok(next)
        })?;
        added.ok_or_else(|| ReviewError::validation("comment was not recorded"))
    }

    /// Close a pull request without merging.
    ///
    /// # Errors
    /// See [`review::close`], plus [`ReviewError::NotFound`] and
    /// [`ReviewError::StaleRevision`].
    #[instrument(skip_all, fields(actor = %actor.id, pr = %id))]
    pub fn close_pull_request(&self, actor: &Actor, id: &PullRequestId) -> Result<PullRequest, ReviewError> {
        let pr = self.with_pull_request(id, |protocol, pr, now| review::close(pr, protocol, actor, now))?;
        tracing::info!("pull request closed");
        Ok(pr)
    }

    /// Lock the pull request's protocol, load both records, apply `f` and
    /// commit the updated pull request.
    fn with_pull_request<F>(&self, id: &PullRequestId, f: F) -> Result<PullRequest, ReviewError>
    where
        F: FnOnce(&Protocol, &PullRequest, u64) -> Result<PullRequest, ReviewError>,
    {
        let protocol_id = self.store.load_pull_request(id)?.record.protocol_id;
        let lock = self.protocol_lock(&protocol_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let pr = self.store.load_pull_request(id)?;
        let protocol = self.store.load_protocol(&protocol_id)?.record;
        let next = f(&protocol, &pr.record, self.clock.now())?;
        self.store
            .commit(WriteSet::new().pull_request(next.clone(), Some(pr.revision)))?;
        Ok(next)
    }
}

fn forbidden(actor: &Actor, action: Action) -> ReviewError {
    ReviewError::Forbidden {
        actor: actor.id.clone(),
        action,
    }
}
