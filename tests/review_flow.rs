//! End-to-end review flows through `ReviewDesk`, mostly over an in-memory
//! store.

use std::sync::{Arc, Barrier};
use std::thread;

use protoreview::access::Actor;
use protoreview::clock::FixedClock;
use protoreview::config::ReviewConfig;
use protoreview::error::ReviewError;
use protoreview::protocol::{MAX_VERSIONS, ProtocolEdit, ProtocolStatus};
use protoreview::pull_request::{PrStatus, ReviewStatus, Verdict};
use protoreview::service::{NewProtocol, NewPullRequest, ReviewDesk};
use protoreview::store::{FileStore, MemoryStore, Store, WriteSet};
use protoreview::{Change, ProtocolId, PullRequestId, Step, StepId, UserId, apply_pr_changes, compute_step_diff};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Desk = ReviewDesk<MemoryStore, FixedClock>;

fn uid(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

fn sid(s: &str) -> StepId {
    StepId::new(s).unwrap()
}

fn step(id: &str, order: u32, title: &str) -> Step {
    Step::new(sid(id), order, title)
}

fn researcher(name: &str) -> Actor {
    Actor::researcher(uid(name))
}

fn desk_with(config: ReviewConfig) -> Desk {
    ReviewDesk::new(MemoryStore::new(), FixedClock::new(1_000), config)
}

fn desk() -> Desk {
    desk_with(ReviewConfig::default())
}

fn create_protocol(desk: &Desk, owner: &Actor, steps: Vec<Step>) -> ProtocolId {
    desk.create_protocol(
        owner,
        NewProtocol {
            title: "Plasmid miniprep".into(),
            description: Some("Alkaline lysis".into()),
            steps,
        },
    )
    .unwrap()
    .id
}

fn open_pr(
    desk: &Desk,
    author: &Actor,
    protocol: &ProtocolId,
    branch: &str,
    changes: Vec<Change>,
    reviewers: &[&str],
) -> PullRequestId {
    desk.create_pull_request(
        author,
        NewPullRequest {
            protocol_id: protocol.clone(),
            branch: branch.into(),
            title: format!("Changes on {branch}"),
            description: None,
            changes,
            reviewers: reviewers.iter().map(|r| uid(r)).collect(),
        },
    )
    .unwrap()
    .id
}

fn add(id: &str, order: u32, title: &str) -> Change {
    Change::Add {
        step: step(id, order, title),
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn open_review_merge_updates_protocol_and_pull_request() {
    let desk = desk();
    let alice = researcher("alice");
    let bob = researcher("bob");

    let old = vec![step("s1", 1, "Mix")];
    let protocol = create_protocol(&desk, &alice, old.clone());
    let new = vec![step("s1", 1, "Mix well"), step("s2", 2, "Incubate")];
    let pr = open_pr(&desk, &alice, &protocol, "longer-spin", compute_step_diff(&old, &new), &["bob"]);

    let reviewed = desk.submit_review(&bob, &pr, Verdict::Approved).unwrap();
    assert_eq!(reviewed.status, PrStatus::Approved);

    let outcome = desk.merge(&alice, &pr).unwrap();
    assert_eq!(outcome.report.from_version, 1);
    assert_eq!(outcome.report.to_version, 2);
    assert!(outcome.report.branch_created);
    assert!(outcome.report.skipped.is_empty());

    let stored = desk.get_protocol(&alice, &protocol).unwrap();
    let titles: Vec<&str> = stored.steps.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, ["Mix well", "Incubate"]);
    assert_eq!(stored.current_version, 2);
    assert_eq!(stored.current_branch, "longer-spin");
    assert_eq!(stored.versions.len(), 1);
    assert_eq!(stored.versions[0].version_number, 1);
    assert_eq!(stored.versions[0].steps, old);
    assert_eq!(stored.branches.len(), 1);
    assert_eq!(stored.branches[0].base_version, 1);
    assert_eq!(stored.branches[0].created_by, uid("alice"));

    let merged = desk.get_pull_request(&pr).unwrap();
    assert_eq!(merged.status, PrStatus::Merged);
    assert_eq!(merged.merged_by, Some(uid("alice")));
    assert_eq!(merged.merged_at, Some(1_000));
}

#[test]
fn diff_then_patch_matches_the_documented_example() {
    let old = vec![step("s1", 1, "Mix")];
    let new = vec![step("s1", 1, "Mix well"), step("s2", 2, "Incubate")];

    let changes = compute_step_diff(&old, &new);
    assert_eq!(changes.len(), 2);
    assert!(matches!(
        &changes[0],
        Change::Edit { step_id, new_step, .. } if step_id.as_str() == "s1" && new_step.title == "Mix well"
    ));
    assert!(matches!(
        &changes[1],
        Change::Add { step } if step.id.as_str() == "s2" && step.title == "Incubate"
    ));

    assert_eq!(apply_pr_changes(&old, &changes), new);
}

#[test]
fn changes_requested_then_approved_allows_merge() {
    let desk = desk();
    let alice = researcher("alice");
    let bob = researcher("bob");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let pr = open_pr(&desk, &alice, &protocol, "b", vec![add("s2", 2, "Spin")], &["bob"]);

    let pr_state = desk.submit_review(&bob, &pr, Verdict::ChangesRequested).unwrap();
    assert_eq!(pr_state.status, PrStatus::ChangesRequested);
    let err = desk.merge(&alice, &pr).unwrap_err();
    assert!(matches!(err, ReviewError::InvalidState { .. }), "{err}");

    let pr_state = desk.submit_review(&bob, &pr, Verdict::Approved).unwrap();
    assert_eq!(pr_state.status, PrStatus::Approved);
    assert_eq!(pr_state.reviewers.len(), 1);
    desk.merge(&alice, &pr).unwrap();
}

#[test]
fn one_rejection_outweighs_approvals() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let pr = open_pr(&desk, &alice, &protocol, "b", vec![add("s2", 2, "Spin")], &["r1", "r2"]);

    desk.submit_review(&researcher("r2"), &pr, Verdict::ChangesRequested).unwrap();
    let state = desk.submit_review(&researcher("r1"), &pr, Verdict::Approved).unwrap();
    assert_eq!(state.status, PrStatus::ChangesRequested);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn malformed_change_sets_are_rejected_before_writing() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let open = |title: &str, changes: Vec<Change>| {
        desk.create_pull_request(
            &alice,
            NewPullRequest {
                protocol_id: protocol.clone(),
                branch: "b".into(),
                title: title.into(),
                description: None,
                changes,
                reviewers: Vec::new(),
            },
        )
    };

    let duplicate = open("Twice", vec![add("x", 2, "Spin"), add("x", 3, "Spin again")]).unwrap_err();
    assert!(matches!(duplicate, ReviewError::Validation { .. }), "{duplicate}");
    assert!(duplicate.to_string().contains("'x'"), "{duplicate}");

    let mismatched = open(
        "Wrong id",
        vec![Change::Edit {
            step_id: sid("s1"),
            new_step: step("s9", 1, "Mix well"),
            old_step: step("s1", 1, "Mix"),
        }],
    )
    .unwrap_err();
    assert!(matches!(mismatched, ReviewError::Validation { .. }), "{mismatched}");

    let blank_step = open("Blank step", vec![add("x", 2, "  ")]).unwrap_err();
    assert!(matches!(blank_step, ReviewError::Validation { .. }), "{blank_step}");

    let blank_title = open("   ", vec![add("x", 2, "Spin")]).unwrap_err();
    assert!(matches!(blank_title, ReviewError::Validation { .. }), "{blank_title}");

    assert!(desk.list_pull_requests(None).unwrap().is_empty());
    assert!(desk.store().list_pull_requests(Some(&protocol)).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Merge guards
// ---------------------------------------------------------------------------

#[test]
fn merge_with_pending_reviewer_requires_approval() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let pr = open_pr(&desk, &alice, &protocol, "b", vec![add("s2", 2, "Spin")], &["r1"]);

    match desk.merge(&alice, &pr).unwrap_err() {
        ReviewError::InvalidState { reason, status, .. } => {
            assert!(reason.contains("requires approval"), "{reason}");
            assert_eq!(status, PrStatus::Open);
        }
        other => panic!("expected InvalidState, got {other}"),
    }
    // Nothing was written.
    let stored = desk.get_protocol(&alice, &protocol).unwrap();
    assert_eq!(stored.current_version, 1);
    assert_eq!(stored.steps.len(), 1);
}

#[test]
fn merge_without_reviewers_succeeds() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let pr = open_pr(&desk, &alice, &protocol, "", vec![add("s2", 2, "Spin")], &[]);

    let outcome = desk.merge(&alice, &pr).unwrap();
    assert_eq!(outcome.report.branch, "main");
    assert!(!outcome.report.branch_created);
    assert!(outcome.protocol.branches.is_empty());
}

#[test]
fn merging_twice_is_invalid_state() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let pr = open_pr(&desk, &alice, &protocol, "b", vec![add("s2", 2, "Spin")], &[]);
    desk.merge(&alice, &pr).unwrap();

    let err = desk.merge(&alice, &pr).unwrap_err();
    assert!(matches!(err, ReviewError::InvalidState { status: PrStatus::Merged, .. }));
    assert_eq!(desk.get_protocol(&alice, &protocol).unwrap().current_version, 2);
}

#[test]
fn outsiders_cannot_merge_but_admins_can() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let pr = open_pr(&desk, &alice, &protocol, "b", vec![add("s2", 2, "Spin")], &[]);

    let err = desk.merge(&researcher("mallory"), &pr).unwrap_err();
    assert!(matches!(err, ReviewError::Forbidden { .. }));

    let outcome = desk.merge(&Actor::admin(uid("root")), &pr).unwrap();
    assert_eq!(outcome.pull_request.merged_by, Some(uid("root")));
}

#[test]
fn approval_guard_can_be_disabled() {
    let config = ReviewConfig::parse("[merge]\nrequire_approval = false\n").unwrap();
    let desk = desk_with(config);
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let pr = open_pr(&desk, &alice, &protocol, "b", vec![add("s2", 2, "Spin")], &["r1"]);

    desk.merge(&alice, &pr).unwrap();
}

#[test]
fn strict_mode_rejects_stale_changes_without_writing() {
    let config = ReviewConfig::parse("[merge]\npatch_mode = \"strict\"\n").unwrap();
    let desk = desk_with(config);
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let stale = Change::Delete {
        step_id: sid("gone"),
        old_step: step("gone", 2, "Old"),
    };
    let pr = open_pr(&desk, &alice, &protocol, "b", vec![stale], &[]);

    let err = desk.merge(&alice, &pr).unwrap_err();
    assert!(matches!(err, ReviewError::Conflict(ref c) if c.conflicts.len() == 1));
    assert_eq!(desk.get_pull_request(&pr).unwrap().status, PrStatus::Open);
}

#[test]
fn lenient_mode_reports_skipped_changes() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let stale = Change::Edit {
        step_id: sid("gone"),
        new_step: step("gone", 1, "New"),
        old_step: step("gone", 1, "Old"),
    };
    let pr = open_pr(&desk, &alice, &protocol, "b", vec![stale, add("s2", 2, "Spin")], &[]);

    let outcome = desk.merge(&alice, &pr).unwrap();
    assert_eq!(outcome.report.skipped.len(), 1);
    assert_eq!(outcome.report.skipped[0].step_id, sid("gone"));
    assert_eq!(outcome.protocol.steps.len(), 2);
}

// ---------------------------------------------------------------------------
// Versions and branches
// ---------------------------------------------------------------------------

#[test]
fn version_history_is_capped_at_fifty() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);

    for _ in 0..51 {
        desk.update_protocol(&alice, &protocol, ProtocolEdit::default(), true)
            .unwrap();
    }

    let stored = desk.get_protocol(&alice, &protocol).unwrap();
    assert_eq!(stored.versions.len(), MAX_VERSIONS);
    assert_eq!(stored.current_version, 52);
    assert!(stored.versions.iter().all(|v| v.version_number != 1));
    assert_eq!(stored.versions[0].version_number, 2);
}

#[test]
fn same_branch_is_recorded_once() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);

    let first = open_pr(&desk, &alice, &protocol, "optimise", vec![add("s2", 2, "Spin")], &[]);
    let second = open_pr(&desk, &alice, &protocol, "optimise", vec![add("s3", 3, "Elute")], &[]);
    assert!(desk.merge(&alice, &first).unwrap().report.branch_created);
    assert!(!desk.merge(&alice, &second).unwrap().report.branch_created);

    let stored = desk.get_protocol(&alice, &protocol).unwrap();
    assert_eq!(stored.branches.iter().filter(|b| b.name == "optimise").count(), 1);
    assert_eq!(stored.current_version, 3);
    assert_eq!(stored.steps.len(), 3);
}

#[test]
fn compare_versions_shows_merge_changes() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let pr = open_pr(&desk, &alice, &protocol, "b", vec![add("s2", 2, "Spin")], &[]);
    desk.merge(&alice, &pr).unwrap();

    let cmp = desk.compare_versions(&alice, &protocol, 0, 1).unwrap();
    assert_eq!(cmp.left.version_number, 1);
    assert_eq!(cmp.right.version_number, 2);
    assert!(cmp.right.current);
    assert_eq!(cmp.changes.len(), 1);
    assert!(cmp.right_text.contains("Spin"));
    assert!(!cmp.left_text.contains("Spin"));

    let err = desk.compare_versions(&alice, &protocol, 0, 2).unwrap_err();
    assert!(matches!(err, ReviewError::Validation { .. }));
}

#[test]
fn drafts_are_hidden_from_other_users_until_published() {
    let desk = desk();
    let alice = researcher("alice");
    let bob = researcher("bob");
    let protocol = create_protocol(&desk, &alice, Vec::new());

    assert!(matches!(
        desk.get_protocol(&bob, &protocol).unwrap_err(),
        ReviewError::Forbidden { .. }
    ));
    assert!(desk.list_protocols(&bob).unwrap().is_empty());

    let publish = ProtocolEdit {
        status: Some(ProtocolStatus::Published),
        ..ProtocolEdit::default()
    };
    desk.update_protocol(&alice, &protocol, publish, false).unwrap();
    assert_eq!(desk.get_protocol(&bob, &protocol).unwrap().status, ProtocolStatus::Published);
    assert_eq!(desk.list_protocols(&bob).unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Comments and closing
// ---------------------------------------------------------------------------

#[test]
fn comments_survive_terminal_states() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);
    let pr = open_pr(&desk, &alice, &protocol, "b", Vec::new(), &["bob"]);

    let closed = desk.close_pull_request(&alice, &pr).unwrap();
    assert_eq!(closed.status, PrStatus::Closed);

    let comment = desk
        .add_comment(&researcher("carol"), &pr, "why closed?", Some("s1".into()))
        .unwrap();
    assert_eq!(comment.path.as_deref(), Some("s1"));

    let err = desk.submit_review(&researcher("bob"), &pr, Verdict::Approved).unwrap_err();
    assert!(matches!(err, ReviewError::InvalidState { .. }));
    let err = desk.close_pull_request(&alice, &pr).unwrap_err();
    assert!(matches!(err, ReviewError::InvalidState { .. }));

    let stored = desk.get_pull_request(&pr).unwrap();
    assert_eq!(stored.comments.len(), 1);
    assert_eq!(stored.reviewers[0].status, ReviewStatus::Pending);
}

#[test]
fn blank_comment_is_rejected() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, Vec::new());
    let pr = open_pr(&desk, &alice, &protocol, "b", Vec::new(), &[]);

    let err = desk.add_comment(&alice, &pr, "   ", None).unwrap_err();
    assert!(matches!(err, ReviewError::Validation { .. }));
    assert!(desk.get_pull_request(&pr).unwrap().comments.is_empty());
}

#[test]
fn unlisted_user_cannot_add_themselves_as_reviewer() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, Vec::new());
    let pr = open_pr(&desk, &alice, &protocol, "b", Vec::new(), &["bob"]);

    let err = desk.submit_review(&researcher("mallory"), &pr, Verdict::Approved).unwrap_err();
    assert!(matches!(err, ReviewError::Forbidden { .. }));
    assert_eq!(desk.get_pull_request(&pr).unwrap().reviewers.len(), 1);
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[test]
fn pull_requests_list_newest_first_within_limit() {
    let config = ReviewConfig::parse("[pull_requests]\nlist_limit = 2\n").unwrap();
    let desk = ReviewDesk::new(MemoryStore::new(), FixedClock::new(0), config);
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, Vec::new());
    let other = create_protocol(&desk, &alice, Vec::new());

    let mut ids = Vec::new();
    for t in 1..=3 {
        desk.clock().set(t * 10);
        ids.push(open_pr(&desk, &alice, &protocol, "b", Vec::new(), &[]));
    }
    desk.clock().set(100);
    open_pr(&desk, &alice, &other, "b", Vec::new(), &[]);

    let listed: Vec<PullRequestId> = desk
        .list_pull_requests(Some(&protocol))
        .unwrap()
        .into_iter()
        .map(|pr| pr.id)
        .collect();
    assert_eq!(listed, vec![ids[2].clone(), ids[1].clone()]);
    assert_eq!(desk.list_pull_requests(None).unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_merges_on_one_protocol_lose_nothing() {
    let desk = Arc::new(desk());
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);

    let prs: Vec<PullRequestId> = (0..8)
        .map(|i| {
            let id = format!("added-{i}");
            open_pr(&desk, &alice, &protocol, &format!("b{i}"), vec![add(&id, 100, "Extra")], &[])
        })
        .collect();

    let handles: Vec<_> = prs
        .into_iter()
        .map(|pr| {
            let desk = Arc::clone(&desk);
            let alice = alice.clone();
            thread::spawn(move || desk.merge(&alice, &pr).map(|_| ()))
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }

    let stored = desk.get_protocol(&alice, &protocol).unwrap();
    assert_eq!(stored.current_version, 9);
    assert_eq!(stored.versions.len(), 8);
    assert_eq!(stored.steps.len(), 9);
    assert_eq!(stored.branches.len(), 8);
    for (i, s) in stored.steps.iter().enumerate() {
        assert_eq!(s.order as usize, i + 1);
    }
}

#[test]
fn concurrent_reviews_are_all_recorded() {
    let desk = Arc::new(desk());
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, Vec::new());
    let names = ["r1", "r2", "r3", "r4", "r5"];
    let pr = open_pr(&desk, &alice, &protocol, "b", Vec::new(), &names);

    let handles: Vec<_> = names
        .iter()
        .map(|name| {
            let desk = Arc::clone(&desk);
            let pr = pr.clone();
            let reviewer = researcher(name);
            thread::spawn(move || desk.submit_review(&reviewer, &pr, Verdict::Approved).map(|_| ()))
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }

    let stored = desk.get_pull_request(&pr).unwrap();
    assert!(stored.reviewers.iter().all(|r| r.status == ReviewStatus::Approved));
    assert_eq!(stored.status, PrStatus::Approved);
}

#[test]
fn stale_writer_is_fenced_by_revision() {
    let desk = desk();
    let alice = researcher("alice");
    let protocol = create_protocol(&desk, &alice, vec![step("s1", 1, "Mix")]);

    let loaded = desk.store().load_protocol(&protocol).unwrap();
    desk.update_protocol(
        &alice,
        &protocol,
        ProtocolEdit {
            title: Some("Renamed".into()),
            ..ProtocolEdit::default()
        },
        false,
    )
    .unwrap();

    let mut stale = loaded.record.clone();
    stale.title = "Lost update".into();
    let err = desk
        .store()
        .commit(WriteSet::new().protocol(stale, Some(loaded.revision)))
        .unwrap_err();
    let err = ReviewError::from(err);
    assert!(matches!(err, ReviewError::StaleRevision { .. }), "{err}");
    assert_eq!(desk.get_protocol(&alice, &protocol).unwrap().title, "Renamed");
}

#[test]
fn desks_sharing_a_directory_never_drop_an_accepted_verdict() {
    let dir = tempfile::TempDir::new().unwrap();
    let desks = [
        ReviewDesk::new(FileStore::new(dir.path()), FixedClock::new(1_000), ReviewConfig::default()),
        ReviewDesk::new(FileStore::new(dir.path()), FixedClock::new(1_000), ReviewConfig::default()),
    ];
    let alice = researcher("alice");
    let protocol = desks[0]
        .create_protocol(
            &alice,
            NewProtocol {
                title: "Shared".into(),
                ..NewProtocol::default()
            },
        )
        .unwrap()
        .id;
    let names = ["r1", "r2"];
    let barrier = Barrier::new(desks.len());

    for round in 0..25 {
        let pr = desks[0]
            .create_pull_request(
                &alice,
                NewPullRequest {
                    protocol_id: protocol.clone(),
                    branch: format!("round-{round}"),
                    title: format!("Round {round}"),
                    description: None,
                    changes: Vec::new(),
                    reviewers: names.iter().map(|n| uid(n)).collect(),
                },
            )
            .unwrap()
            .id;

        let results: Vec<Result<(), ReviewError>> = thread::scope(|scope| {
            let workers: Vec<_> = desks
                .iter()
                .zip(names)
                .map(|(desk, name)| {
                    let (pr, barrier) = (&pr, &barrier);
                    scope.spawn(move || {
                        barrier.wait();
                        desk.submit_review(&researcher(name), pr, Verdict::Approved).map(|_| ())
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let stored = desks[1].get_pull_request(&pr).unwrap();
        for (name, result) in names.iter().zip(&results) {
            let reviewer = stored.reviewers.iter().find(|r| r.user_id == uid(name)).unwrap();
            match result {
                Ok(()) => assert_eq!(reviewer.status, ReviewStatus::Approved, "{name} in round {round}"),
                Err(ReviewError::StaleRevision { .. }) => {
                    assert_eq!(reviewer.status, ReviewStatus::Pending, "{name} in round {round}");
                }
                Err(other) => panic!("{name} in round {round}: {other}"),
            }
        }
        assert!(results.iter().any(Result::is_ok), "round {round} had no winner");
    }
}
