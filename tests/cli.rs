//! Drives the `protoreview` binary against a file store in a temp directory.

mod common;

use std::process::Command;

use common::*;
use serde_json::json;

fn create_protocol(dir: &std::path::Path, actor: &str) -> String {
    let steps = write_json(
        dir,
        "steps.json",
        &json!([{ "id": "s1", "order": 1, "title": "Mix" }]),
    );
    let created = json_as(
        dir,
        actor,
        &["protocol", "create", "--title", "Miniprep", "--steps", steps],
    );
    assert_eq!(created["currentVersion"], 1);
    assert_eq!(created["status"], "draft");
    created["id"].as_str().unwrap().to_owned()
}

#[test]
fn full_review_cycle_through_the_cli() {
    let dir = setup_store();
    let protocol = create_protocol(dir.path(), "alice");

    let edited = write_json(
        dir.path(),
        "edited.json",
        &json!([
            { "id": "s1", "order": 1, "title": "Mix well" },
            { "id": "s2", "order": 2, "title": "Incubate", "timing": "10 min" }
        ]),
    );
    let pr = json_as(
        dir.path(),
        "alice",
        &[
            "pr", "open", &protocol, "--title", "Longer mixing", "--branch", "longer-mix",
            "--edited", edited, "--reviewer", "bob",
        ],
    );
    assert_eq!(pr["status"], "open");
    assert_eq!(pr["changes"].as_array().unwrap().len(), 2);
    assert_eq!(pr["reviewers"][0]["status"], "pending");
    let pr_id = pr["id"].as_str().unwrap().to_owned();

    let reviewed = json_as(dir.path(), "bob", &["pr", "review", &pr_id, "approved"]);
    assert_eq!(reviewed["status"], "approved");

    let report = json_as(dir.path(), "alice", &["pr", "merge", &pr_id]);
    assert_eq!(report["fromVersion"], 1);
    assert_eq!(report["toVersion"], 2);
    assert_eq!(report["branchCreated"], true);

    let shown = json_as(dir.path(), "alice", &["protocol", "show", &protocol]);
    assert_eq!(shown["currentVersion"], 2);
    assert_eq!(shown["currentBranch"], "longer-mix");
    assert_eq!(shown["steps"][0]["title"], "Mix well");
    assert_eq!(shown["steps"][1]["order"], 2);
    assert_eq!(shown["versions"].as_array().unwrap().len(), 1);

    let text = ok_as(dir.path(), "alice", &["pr", "show", &pr_id]);
    assert!(text.contains("merged by alice"), "{text}");

    // Records are plain JSON envelopes on disk.
    let on_disk = dir
        .path()
        .join(".protoreview")
        .join("pull-requests")
        .join(format!("{pr_id}.json"));
    assert!(on_disk.exists());
}

#[test]
fn comment_and_close() {
    let dir = setup_store();
    let protocol = create_protocol(dir.path(), "alice");
    let changes = write_json(dir.path(), "changes.json", &json!([]));
    let pr = json_as(
        dir.path(),
        "alice",
        &["pr", "open", &protocol, "--title", "Nothing", "--changes", changes],
    );
    let pr_id = pr["id"].as_str().unwrap().to_owned();

    ok_as(dir.path(), "alice", &["pr", "close", &pr_id]);
    let comment = json_as(
        dir.path(),
        "carol",
        &["pr", "comment", &pr_id, "Superseded", "--path", "s1"],
    );
    assert_eq!(comment["text"], "Superseded");

    let shown = json_as(dir.path(), "alice", &["pr", "show", &pr_id]);
    assert_eq!(shown["status"], "closed");
    assert_eq!(shown["comments"].as_array().unwrap().len(), 1);

    let listed = json_as(dir.path(), "alice", &["pr", "list", "--protocol", &protocol]);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[test]
fn merge_by_outsider_is_refused_with_a_fix_hint() {
    let dir = setup_store();
    let protocol = create_protocol(dir.path(), "alice");
    let changes = write_json(
        dir.path(),
        "changes.json",
        &json!([{ "type": "add", "step": { "id": "s2", "order": 2, "title": "Spin" } }]),
    );
    let pr = json_as(
        dir.path(),
        "alice",
        &["pr", "open", &protocol, "--title", "Spin", "--changes", changes],
    );
    let pr_id = pr["id"].as_str().unwrap().to_owned();

    let stderr = fails_as(dir.path(), "mallory", &["pr", "merge", &pr_id]);
    assert!(stderr.contains("may not merge"), "{stderr}");
    assert!(stderr.contains("To fix"), "{stderr}");

    let shown = json_as(dir.path(), "alice", &["protocol", "show", &protocol]);
    assert_eq!(shown["currentVersion"], 1);
}

#[test]
fn strict_patch_mode_from_config_refuses_stale_changes() {
    let dir = setup_store();
    let protocol = create_protocol(dir.path(), "alice");
    std::fs::write(
        dir.path().join(".protoreview").join("config.toml"),
        "[merge]\npatch_mode = \"strict\"\n",
    )
    .unwrap();
    let changes = write_json(
        dir.path(),
        "changes.json",
        &json!([{
            "type": "delete",
            "stepId": "gone",
            "oldStep": { "id": "gone", "order": 1, "title": "Old" }
        }]),
    );
    let pr = json_as(
        dir.path(),
        "alice",
        &["pr", "open", &protocol, "--title", "Stale", "--changes", changes],
    );
    let pr_id = pr["id"].as_str().unwrap().to_owned();

    let stderr = fails_as(dir.path(), "alice", &["pr", "merge", &pr_id]);
    assert!(stderr.contains("merge refused"), "{stderr}");
    assert!(stderr.contains("gone"), "{stderr}");
}

#[test]
fn unknown_config_keys_are_rejected() {
    let dir = setup_store();
    create_protocol(dir.path(), "alice");
    std::fs::write(
        dir.path().join(".protoreview").join("config.toml"),
        "[merge]\nautomerge = true\n",
    )
    .unwrap();

    let stderr = fails_as(dir.path(), "alice", &["protocol", "list"]);
    assert!(stderr.contains("automerge"), "{stderr}");
}

#[test]
fn pending_is_not_a_verdict() {
    let dir = setup_store();
    let stderr = fails_as(dir.path(), "bob", &["pr", "review", "some-pr", "pending"]);
    assert!(stderr.contains("pending"), "{stderr}");
}

#[test]
fn missing_actor_explains_how_to_set_one() {
    let dir = setup_store();
    let out = Command::new(env!("CARGO_BIN_EXE_protoreview"))
        .args(["protocol", "list"])
        .current_dir(dir.path())
        .env_remove("PROTOREVIEW_ACTOR")
        .env_remove("PROTOREVIEW_STORE")
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("PROTOREVIEW_ACTOR"), "{stderr}");
}

#[test]
fn diff_output_feeds_patch() {
    let dir = setup_store();
    let old = write_json(
        dir.path(),
        "old.json",
        &json!([
            { "id": "a", "order": 1, "title": "Thaw" },
            { "id": "b", "order": 2, "title": "Spin" }
        ]),
    );
    let new = write_json(
        dir.path(),
        "new.json",
        &json!([
            { "id": "a", "order": 1, "title": "Thaw on ice" },
            { "id": "c", "order": 2, "title": "Elute" }
        ]),
    );

    let changes = json_as(dir.path(), "alice", &["diff", old, new]);
    let kinds: Vec<&str> = changes
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["delete", "edit", "add"]);

    let changes = write_json(dir.path(), "changes.json", &changes);
    let patched = json_as(dir.path(), "alice", &["patch", old, changes]);
    let titles: Vec<&str> = patched
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Thaw on ice", "Elute"]);
}

#[test]
fn strict_patch_fails_on_missing_targets() {
    let dir = setup_store();
    let steps = write_json(dir.path(), "steps.json", &json!([]));
    let changes = write_json(
        dir.path(),
        "changes.json",
        &json!([{
            "type": "edit",
            "stepId": "x",
            "step": { "id": "x", "order": 1, "title": "New" },
            "oldStep": { "id": "x", "order": 1, "title": "Old" }
        }]),
    );

    let out = ok_as(dir.path(), "alice", &["--format", "json", "patch", steps, changes]);
    assert_eq!(out.trim(), "[]");
    let stderr = fails_as(dir.path(), "alice", &["patch", "--strict", steps, changes]);
    assert!(stderr.contains("do not apply"), "{stderr}");
}

#[test]
fn completions_are_generated() {
    let dir = setup_store();
    let out = ok_as(dir.path(), "alice", &["completions", "bash"]);
    assert!(out.contains("protoreview"));
}
