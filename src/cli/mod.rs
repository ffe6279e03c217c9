//! Command handlers for the `protoreview` binary.

use std::fmt::Write as _;
use std::io::Read as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use protoreview::access::{Actor, Role};
use protoreview::clock::SystemClock;
use protoreview::config::ReviewConfig;
use protoreview::service::ReviewDesk;
use protoreview::store::FileStore;
use protoreview::{Change, Step, UserId};
use serde::de::DeserializeOwned;

use crate::format::OutputFormat;

pub mod pr;
pub mod protocol;
pub mod tools;

/// Everything a store-backed command needs.
pub struct Session {
    pub desk: ReviewDesk<FileStore, SystemClock>,
    actor: Option<Actor>,
    pub format: OutputFormat,
}

impl Session {
    /// Open the store at `store` and load its config.
    pub fn open(store: PathBuf, actor: Option<String>, admin: bool, format: OutputFormat) -> Result<Self> {
        let config = ReviewConfig::load_for_store(&store)?;
        let actor = actor
            .map(|name| -> Result<Actor> {
                let id = UserId::new(&name)?;
                let role = if admin { Role::Admin } else { Role::Researcher };
                Ok(Actor::new(id, role))
            })
            .transpose()?;
        Ok(Self {
            desk: ReviewDesk::new(FileStore::new(store), SystemClock, config),
            actor,
            format,
        })
    }

    /// The acting user, or an error explaining how to set one.
    pub fn actor(&self) -> Result<&Actor> {
        match &self.actor {
            Some(actor) => Ok(actor),
            None => bail!(
                "no acting user.\n  To fix: pass --actor <user> or set PROTOREVIEW_ACTOR."
            ),
        }
    }
}

/// Read JSON from `path`, or from stdin when `path` is `-`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

// ---------------------------------------------------------------------------
// Text rendering shared by the subcommands
// ---------------------------------------------------------------------------

pub fn render_steps(steps: &[Step]) -> String {
    let mut out = String::new();
    for step in steps {
        let _ = writeln!(out, "  {:>3}. [{}] {}", step.order, step.id, step.title);
        if !step.reagents.is_empty() {
            let _ = writeln!(out, "       reagents: {}", step.reagents.join(", "));
        }
        if !step.equipment.is_empty() {
            let _ = writeln!(out, "       equipment: {}", step.equipment.join(", "));
        }
        if let Some(timing) = &step.timing {
            let _ = writeln!(out, "       timing: {timing}");
        }
        if let Some(notes) = &step.notes {
            let _ = writeln!(out, "       notes: {notes}");
        }
    }
    out.trim_end().to_owned()
}

pub fn render_changes(changes: &[Change]) -> String {
    if changes.is_empty() {
        return "  (no changes)".to_owned();
    }
    changes
        .iter()
        .map(|c| format!("  {c}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format Unix milliseconds as seconds since the epoch.
pub fn timestamp(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}
