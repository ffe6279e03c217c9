use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use protoreview::ProtocolId;
use protoreview::protocol::{Protocol, ProtocolEdit, ProtocolStatus, VersionComparison};
use protoreview::service::NewProtocol;

use super::{Session, read_json, render_changes, render_steps, timestamp};

#[derive(Subcommand)]
pub enum ProtocolCommands {
    /// Create a draft protocol owned by the acting user
    ///
    /// Examples:
    ///   protoreview protocol create --title "Miniprep"
    ///   protoreview protocol create --title "Miniprep" --steps steps.json
    Create {
        /// Protocol title
        #[arg(long)]
        title: String,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// JSON array of initial steps ('-' for stdin)
        #[arg(long)]
        steps: Option<PathBuf>,
    },

    /// List protocols you can see, most recently updated first
    List,

    /// Show a protocol's steps, branches and version history
    Show {
        /// Protocol id
        id: ProtocolId,
    },

    /// Edit title, description, steps or status
    ///
    /// With --new-version the current state is saved as a version snapshot
    /// before the edit and the version number goes up by one.
    Edit {
        /// Protocol id
        id: ProtocolId,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description (empty string clears it)
        #[arg(long)]
        description: Option<String>,

        /// JSON array replacing all steps ('-' for stdin)
        #[arg(long)]
        steps: Option<PathBuf>,

        /// New status: draft, published or archived
        #[arg(long)]
        status: Option<ProtocolStatus>,

        /// Snapshot the current state first
        #[arg(long)]
        new_version: bool,
    },

    /// Compare two versions
    ///
    /// Versions are numbered by position, oldest snapshot first; the
    /// highest index is the current state. 'protocol show' lists them.
    Compare {
        /// Protocol id
        id: ProtocolId,
        /// Older version index
        left: usize,
        /// Newer version index
        right: usize,
    },
}

pub fn run(session: &Session, cmd: ProtocolCommands) -> Result<()> {
    let actor = session.actor()?;
    let desk = &session.desk;
    match cmd {
        ProtocolCommands::Create {
            title,
            description,
            steps,
        } => {
            let steps = steps.map(|p| read_json(&p)).transpose()?.unwrap_or_default();
            let protocol = desk.create_protocol(
                actor,
                NewProtocol {
                    title,
                    description,
                    steps,
                },
            )?;
            session.format.print(&protocol, |p| {
                format!(
                    "Created protocol {} ({} steps, version {}).",
                    p.id,
                    p.steps.len(),
                    p.current_version
                )
            })
        }
        ProtocolCommands::List => {
            let protocols = desk.list_protocols(actor)?;
            session.format.print(&protocols, |ps| {
                if ps.is_empty() {
                    return "No protocols.".to_owned();
                }
                ps.iter()
                    .map(|p| {
                        format!(
                            "{}  v{:<3} {:<9} {}",
                            p.id, p.current_version, p.status, p.title
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        ProtocolCommands::Show { id } => {
            let protocol = desk.get_protocol(actor, &id)?;
            session.format.print(&protocol, render_protocol)
        }
        ProtocolCommands::Edit {
            id,
            title,
            description,
            steps,
            status,
            new_version,
        } => {
            let edit = ProtocolEdit {
                title,
                description,
                steps: steps.map(|p| read_json(&p)).transpose()?,
                status,
            };
            let protocol = desk.update_protocol(actor, &id, edit, new_version)?;
            session.format.print(&protocol, |p| {
                format!("Updated protocol {} (version {}).", p.id, p.current_version)
            })
        }
        ProtocolCommands::Compare { id, left, right } => {
            let cmp = desk.compare_versions(actor, &id, left, right)?;
            session.format.print(&cmp, render_comparison)
        }
    }
}

fn render_protocol(p: &Protocol) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} [{}]", p.title, p.id);
    if let Some(d) = &p.description {
        let _ = writeln!(out, "{d}");
    }
    let _ = writeln!(
        out,
        "author: {}  status: {}  version: {}  branch: {}",
        p.author_id, p.status, p.current_version, p.current_branch
    );
    let _ = writeln!(out, "\nSteps:");
    if p.steps.is_empty() {
        let _ = writeln!(out, "  (none)");
    } else {
        let _ = writeln!(out, "{}", render_steps(&p.steps));
    }
    if !p.branches.is_empty() {
        let _ = writeln!(out, "\nBranches:");
        for b in &p.branches {
            let _ = writeln!(
                out,
                "  {}  from v{} by {} at {}",
                b.name,
                b.base_version,
                b.created_by,
                timestamp(b.created_at)
            );
        }
    }
    let _ = writeln!(out, "\nVersions (index  version):");
    for v in p.history() {
        match (v.saved_by, v.saved_at) {
            (Some(by), Some(at)) => {
                let _ = writeln!(
                    out,
                    "  {:>3}  v{}  {} saved by {by} at {}",
                    v.index,
                    v.version_number,
                    v.title,
                    timestamp(at)
                );
            }
            _ => {
                let _ = writeln!(out, "  {:>3}  v{}  (current)", v.index, v.version_number);
            }
        }
    }
    out.trim_end().to_owned()
}

fn render_comparison(cmp: &VersionComparison) -> String {
    format!(
        "Comparing v{} (index {}) -> v{} (index {})\n\nChanges:\n{}\n\n--- v{}\n{}\n\n+++ v{}\n{}",
        cmp.left.version_number,
        cmp.left.index,
        cmp.right.version_number,
        cmp.right.index,
        render_changes(&cmp.changes),
        cmp.left.version_number,
        cmp.left_text,
        cmp.right.version_number,
        cmp.right_text
    )
}
