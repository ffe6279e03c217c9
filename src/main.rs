use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

mod cli;
mod format;
mod telemetry;

use format::OutputFormat;

/// Review, merge and version experimental protocols
///
/// A protocol is an ordered list of steps. Changes are proposed as pull
/// requests (add, edit or delete steps), reviewed, and merged. Every merge
/// snapshots the previous version and records the pull request's branch.
///
/// QUICK START:
///
///   export PROTOREVIEW_ACTOR=alice
///   protoreview protocol create --title "Miniprep" --steps steps.json
///   protoreview pr open <protocol-id> --title "Longer spin" --edited new-steps.json --reviewer bob
///   PROTOREVIEW_ACTOR=bob protoreview pr review <pr-id> approved
///   protoreview pr merge <pr-id>
///
/// Records live under --store (default .protoreview/) as JSON files.
/// Settings are read from <store>/config.toml.
#[derive(Parser)]
#[command(name = "protoreview")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'protoreview <command> --help' for more information on a specific command.")]
struct Cli {
    /// Directory holding protocols, pull requests and config.toml
    #[arg(long, global = true, env = "PROTOREVIEW_STORE", default_value = ".protoreview")]
    store: PathBuf,

    /// User performing the command
    #[arg(long, global = true, env = "PROTOREVIEW_ACTOR")]
    actor: Option<String>,

    /// Act with administrator privileges
    #[arg(long, global = true)]
    admin: bool,

    /// Output format: text or json
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, inspect and edit protocols
    #[command(subcommand)]
    Protocol(cli::protocol::ProtocolCommands),

    /// Open, review, merge and close pull requests
    #[command(subcommand)]
    Pr(cli::pr::PrCommands),

    /// Compute the change set between two step files
    ///
    /// Both files hold a JSON array of steps. The output can be passed to
    /// 'pr open --changes'.
    Diff {
        /// Steps before
        old: PathBuf,
        /// Steps after
        new: PathBuf,
    },

    /// Apply a change set to a step file and print the result
    Patch {
        /// JSON array of steps
        steps: PathBuf,
        /// JSON array of changes
        changes: PathBuf,
        /// Fail if any change does not apply instead of skipping it
        #[arg(long)]
        strict: bool,
    },

    /// Print shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let _telemetry = telemetry::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Diff { old, new } => cli::tools::diff(&old, &new, cli.format),
        Commands::Patch {
            steps,
            changes,
            strict,
        } => cli::tools::patch(&steps, &changes, strict, cli.format),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "protoreview", &mut std::io::stdout());
            Ok(())
        }
        Commands::Protocol(cmd) => {
            let session = cli::Session::open(cli.store, cli.actor, cli.admin, cli.format)?;
            cli::protocol::run(&session, cmd)
        }
        Commands::Pr(cmd) => {
            let session = cli::Session::open(cli.store, cli.actor, cli.admin, cli.format)?;
            cli::pr::run(&session, cmd)
        }
    }
}
