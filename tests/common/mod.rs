//! Shared helpers for driving the `protoreview` binary.
//!
//! Each test runs against its own store inside a temp directory.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

/// A fresh working directory; the store lands in `<dir>/.protoreview`.
pub fn setup_store() -> TempDir {
    TempDir::new().expect("failed to create temp dir")
}

/// Run protoreview as `actor` in `dir`.
pub fn protoreview_as(dir: &Path, actor: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_protoreview"))
        .args(args)
        .current_dir(dir)
        .env("PROTOREVIEW_ACTOR", actor)
        .env_remove("PROTOREVIEW_STORE")
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .output()
        .expect("failed to execute protoreview")
}

/// Run protoreview and assert it succeeds. Returns stdout.
pub fn ok_as(dir: &Path, actor: &str, args: &[&str]) -> String {
    let out = protoreview_as(dir, actor, args);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "protoreview {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.to_string()
}

/// Run protoreview and assert it fails. Returns stderr.
pub fn fails_as(dir: &Path, actor: &str, args: &[&str]) -> String {
    let out = protoreview_as(dir, actor, args);
    assert!(
        !out.status.success(),
        "Expected protoreview {} to fail, but it succeeded.\nstdout: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}

/// Run with `--format json` and parse stdout.
pub fn json_as(dir: &Path, actor: &str, args: &[&str]) -> Value {
    let mut full = vec!["--format", "json"];
    full.extend_from_slice(args);
    let stdout = ok_as(dir, actor, &full);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("invalid JSON ({e}):\n{stdout}"))
}

/// Write `value` as JSON to `<dir>/<name>` and return the file name.
pub fn write_json<'a>(dir: &Path, name: &'a str, value: &Value) -> &'a str {
    std::fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap())
        .expect("failed to write JSON fixture");
    name
}
