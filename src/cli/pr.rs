use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Subcommand};
use protoreview::merge::MergeReport;
use protoreview::pull_request::{PullRequest, Verdict};
use protoreview::service::NewPullRequest;
use protoreview::{Change, ProtocolId, PullRequestId, Step, UserId, compute_step_diff};

use super::{Session, read_json, render_changes, timestamp};

#[derive(Subcommand)]
pub enum PrCommands {
    /// Open a pull request against a protocol
    ///
    /// Supply the change set directly with --changes, or pass an edited
    /// copy of the steps with --edited and let it be diffed against the
    /// protocol's current steps.
    ///
    /// Examples:
    ///   protoreview pr open <protocol> --title "Longer spin" --edited steps.json
    ///   protoreview diff old.json new.json > changes.json
    ///   protoreview pr open <protocol> --title "Longer spin" --changes changes.json --reviewer bob
    #[command(group(ArgGroup::new("source").required(true).args(["changes", "edited"])))]
    Open {
        /// Target protocol id
        protocol: ProtocolId,

        /// Pull request title
        #[arg(long)]
        title: String,

        /// Branch name recorded on the protocol when merged
        #[arg(long, default_value = "")]
        branch: String,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// JSON array of changes ('-' for stdin)
        #[arg(long)]
        changes: Option<PathBuf>,

        /// JSON array of edited steps ('-' for stdin)
        #[arg(long)]
        edited: Option<PathBuf>,

        /// Assign a reviewer (repeatable)
        #[arg(long = "reviewer")]
        reviewers: Vec<UserId>,
    },

    /// Show a pull request with its changes, reviewers and comments
    Show {
        /// Pull request id
        id: PullRequestId,
    },

    /// List pull requests, newest first
    List {
        /// Only pull requests against this protocol
        #[arg(long)]
        protocol: Option<ProtocolId>,
    },

    /// Submit a verdict: approved or changes_requested
    Review {
        /// Pull request id
        id: PullRequestId,
        /// approved | changes_requested
        verdict: Verdict,
    },

    /// Comment on a pull request (allowed in every state)
    Comment {
        /// Pull request id
        id: PullRequestId,
        /// Comment text
        text: String,
        /// Step id the comment refers to
        #[arg(long)]
        path: Option<String>,
    },

    /// Merge a pull request into its protocol
    Merge {
        /// Pull request id
        id: PullRequestId,
    },

    /// Close a pull request without merging
    Close {
        /// Pull request id
        id: PullRequestId,
    },
}

pub fn run(session: &Session, cmd: PrCommands) -> Result<()> {
    let desk = &session.desk;
    let fmt = session.format;
    match cmd {
        PrCommands::Open {
            protocol,
            title,
            branch,
            description,
            changes,
            edited,
            reviewers,
        } => {
            let actor = session.actor()?;
            let changes: Vec<Change> = match (changes, edited) {
                (Some(path), _) => read_json(&path)?,
                (None, Some(path)) => {
                    let edited: Vec<Step> = read_json(&path)?;
                    let current = desk.get_protocol(actor, &protocol)?;
                    compute_step_diff(&current.steps, &edited)
                }
                (None, None) => Vec::new(),
            };
            let pr = desk.create_pull_request(
                actor,
                NewPullRequest {
                    protocol_id: protocol,
                    branch,
                    title,
                    description,
                    changes,
                    reviewers,
                },
            )?;
            fmt.print(&pr, |pr| {
                format!(
                    "Opened pull request {} with {} change(s).\n{}",
                    pr.id,
                    pr.changes.len(),
                    render_changes(&pr.changes)
                )
            })
        }
        PrCommands::Show { id } => {
            let pr = desk.get_pull_request(&id)?;
            fmt.print(&pr, render_pull_request)
        }
        PrCommands::List { protocol } => {
            let prs = desk.list_pull_requests(protocol.as_ref())?;
            fmt.print(&prs, |prs| {
                if prs.is_empty() {
                    return "No pull requests.".to_owned();
                }
                prs.iter()
                    .map(|pr| {
                        format!(
                            "{}  {:<17} {}  ({} by {})",
                            pr.id, pr.status, pr.title, pr.protocol_id, pr.author_id
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        PrCommands::Review { id, verdict } => {
            let pr = desk.submit_review(session.actor()?, &id, verdict)?;
            fmt.print(&pr, |pr| {
                format!("Recorded {verdict} on {}; status is now {}.", pr.id, pr.status)
            })
        }
        PrCommands::Comment { id, text, path } => {
            let comment = desk.add_comment(session.actor()?, &id, &text, path)?;
            fmt.print(&comment, |c| format!("Added comment {} to {id}.", c.id))
        }
        PrCommands::Merge { id } => {
            let outcome = desk.merge(session.actor()?, &id)?;
            fmt.print(&outcome.report, render_merge_report)
        }
        PrCommands::Close { id } => {
            let pr = desk.close_pull_request(session.actor()?, &id)?;
            fmt.print(&pr, |pr| format!("Closed pull request {}.", pr.id))
        }
    }
}

fn render_pull_request(pr: &PullRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} [{}]", pr.title, pr.id);
    let _ = writeln!(
        out,
        "protocol: {}  author: {}  branch: {}  status: {}",
        pr.protocol_id,
        pr.author_id,
        if pr.branch.is_empty() { "-" } else { pr.branch.as_str() },
        pr.status
    );
    if let Some(d) = &pr.description {
        let _ = writeln!(out, "{d}");
    }
    if let (Some(by), Some(at)) = (&pr.merged_by, pr.merged_at) {
        let _ = writeln!(out, "merged by {by} at {}", timestamp(at));
    }
    let _ = writeln!(out, "\nChanges:\n{}", render_changes(&pr.changes));
    if !pr.reviewers.is_empty() {
        let _ = writeln!(out, "\nReviewers:");
        for r in &pr.reviewers {
            let _ = writeln!(out, "  {:<20} {}", r.user_id, r.status);
        }
    }
    if !pr.comments.is_empty() {
        let _ = writeln!(out, "\nComments:");
        for c in &pr.comments {
            let at = c.path.as_deref().map(|p| format!(" on [{p}]")).unwrap_or_default();
            let _ = writeln!(out, "  {}{at}: {}", c.author_id, c.text);
        }
    }
    out.trim_end().to_owned()
}

fn render_merge_report(report: &MergeReport) -> String {
    let mut out = format!(
        "Merged: version {} -> {} on branch '{}' ({}).",
        report.from_version, report.to_version, report.branch, report.summary
    );
    if report.branch_created {
        let _ = write!(out, "\nRecorded new branch '{}'.", report.branch);
    }
    if !report.skipped.is_empty() {
        let _ = write!(out, "\nSkipped {} change(s) that no longer apply:", report.skipped.len());
        for s in &report.skipped {
            let _ = write!(out, "\n  - {s}");
        }
    }
    out
}
