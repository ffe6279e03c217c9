//! Store-free commands over step files: `diff` and `patch`.

use std::path::Path;

use anyhow::Result;
use protoreview::{Change, PatchMode, Step, apply_changes, compute_step_diff};

use super::{read_json, render_changes, render_steps};
use crate::format::OutputFormat;

pub fn diff(old: &Path, new: &Path, format: OutputFormat) -> Result<()> {
    let old: Vec<Step> = read_json(old)?;
    let new: Vec<Step> = read_json(new)?;
    let changes = compute_step_diff(&old, &new);
    tracing::debug!(changes = changes.len(), "computed step diff");

    format.print(&changes, |changes| render_changes(changes))
}

pub fn patch(steps: &Path, changes: &Path, strict: bool, format: OutputFormat) -> Result<()> {
    let steps: Vec<Step> = read_json(steps)?;
    let changes: Vec<Change> = read_json(changes)?;
    let mode = if strict {
        PatchMode::Strict
    } else {
        PatchMode::Lenient
    };

    let outcome = apply_changes(&steps, &changes, mode)?;
    // Skips go to stderr so stdout stays a valid step array.
    for s in &outcome.skipped {
        eprintln!("skipped {s}");
    }
    format.print(&outcome.steps, |steps| {
        if steps.is_empty() {
            "  (no steps)".to_owned()
        } else {
            render_steps(steps)
        }
    })
}
