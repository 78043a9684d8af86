#![forbid(unsafe_code)]

mod cmd;
mod notifier;
mod output;
mod person;

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "rota: fair household chore rotation",
    long_about = None
)]
struct Cli {
    /// Output format. Defaults to pretty on a terminal and text when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true)]
    json: bool,

    /// Act as this person (skips env resolution).
    #[arg(long, global = true)]
    person: Option<String>,

    /// Household directory containing `.rota/`. Defaults to the current directory.
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Evaluate as if the current time were this RFC 3339 instant.
    #[arg(long, global = true, value_name = "TIME")]
    at: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Create a household",
        long_about = "Create .rota/ with a sample config and an empty ledger.",
        after_help = "EXAMPLES:\n    # Start a household in the current directory\n    rota init\n\n    # Replace the config, keeping the ledger\n    rota init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Scheduled",
        about = "Allocate this week's chores",
        long_about = "Assign every scheduled chore for the current cycle. Running it again in the same cycle changes nothing.",
        after_help = "EXAMPLES:\n    # Weekly cron entry\n    rota assign\n\n    # Reproducible tie-breaks\n    rota assign --seed 42\n\n    # Emit machine-readable output\n    rota assign --json"
    )]
    Assign(cmd::assign::AssignArgs),

    #[command(
        next_help_heading = "Scheduled",
        about = "Remind people of chores due soon",
        long_about = "Message everyone with an unconfirmed chore due within the reminder lookahead.",
        after_help = "EXAMPLES:\n    # Every 15 minutes from cron\n    rota remind"
    )]
    Remind(cmd::remind::RemindArgs),

    #[command(
        next_help_heading = "Messages",
        about = "Confirm a finished chore",
        long_about = "Handle a completion message. With several open chores, lists them so the sender can `rota pick` one.",
        after_help = "EXAMPLES:\n    # Confirm the only open chore\n    rota --person ana done\n\n    # Free text works if it contains the keyword\n    rota --person ana done all done with the trash"
    )]
    Done(cmd::done::DoneArgs),

    #[command(
        next_help_heading = "Messages",
        about = "Confirm one chore by title",
        long_about = "Answer a disambiguation prompt by naming the finished chore.",
        after_help = "EXAMPLES:\n    rota --person ana pick Clean bathroom"
    )]
    Pick(cmd::done::PickArgs),

    #[command(
        next_help_heading = "Messages",
        about = "Request an on-demand chore",
        long_about = "Create an ad-hoc assignment for the chore a request names, given to whoever has the least credit for it.",
        after_help = "EXAMPLES:\n    rota --person bo trigger the trash is full"
    )]
    Trigger(cmd::trigger::TriggerArgs),

    #[command(
        next_help_heading = "Messages",
        about = "Share a chore with chosen people",
        long_about = "Create an ad-hoc assignment shared by the people named with --with.",
        after_help = "EXAMPLES:\n    rota --person ana share kitchen --with ana --with bo"
    )]
    Share(cmd::share::ShareArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show this cycle's chores",
        after_help = "EXAMPLES:\n    rota status\n\n    # Only chores still waiting on someone\n    rota status --open"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show workload credit per person",
        after_help = "EXAMPLES:\n    # Inside the fairness window\n    rota stats\n\n    # Whole ledger\n    rota stats --all"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Dry-run the allocator",
        long_about = "Simulate weekly cycles against an in-memory copy of the household.",
        after_help = "EXAMPLES:\n    rota simulate --weeks 26 --seed 1"
    )]
    Simulate(cmd::simulate::SimulateArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Import a legacy JSON ledger",
        after_help = "EXAMPLES:\n    rota import assignments.json"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    rota completions bash > /etc/bash_completion.d/rota"
    )]
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ROTA_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "rota=debug,rota_core=debug,info"
        } else {
            "rota=info,rota_core=info,warn"
        })
    });

    let format = env::var("ROTA_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Config-level output preference, if a readable config exists.
fn configured_output(root: &std::path::Path) -> Option<String> {
    rota_core::config::load_household_config(root)
        .ok()
        .and_then(|config| config.output)
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let root = match cli.root.clone() {
        Some(root) => root,
        None => env::current_dir()?,
    };
    let output = output::resolve_output_mode(
        cli.format,
        cli.json,
        configured_output(&root).as_deref(),
    );
    let inv = cmd::Invocation {
        root: &root,
        output,
        person: cli.person.as_deref(),
        now: cli.at.unwrap_or_else(Utc::now),
    };
    tracing::debug!(root = %root.display(), ?output, "starting");

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &inv),
        Commands::Assign(args) => cmd::assign::run_assign(args, &inv),
        Commands::Remind(args) => cmd::remind::run_remind(args, &inv),
        Commands::Done(args) => cmd::done::run_done(args, &inv),
        Commands::Pick(args) => cmd::done::run_pick(args, &inv),
        Commands::Trigger(args) => cmd::trigger::run_trigger(args, &inv),
        Commands::Share(args) => cmd::share::run_share(args, &inv),
        Commands::Status(args) => cmd::status::run_status(args, &inv),
        Commands::Stats(args) => cmd::stats::run_stats(args, &inv),
        Commands::Simulate(args) => cmd::simulate::run_simulate(args, &inv),
        Commands::Import(args) => cmd::import::run_import(args, &inv),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "rota", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_before_and_after_subcommand() {
        let cli = Cli::parse_from(["rota", "--json", "status"]);
        assert!(cli.json);
        let cli = Cli::parse_from(["rota", "status", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn format_flag_parses() {
        let cli = Cli::parse_from(["rota", "--format", "text", "stats"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
    }

    #[test]
    fn person_flag_parsed() {
        let cli = Cli::parse_from(["rota", "--person", "ana", "done"]);
        assert_eq!(cli.person.as_deref(), Some("ana"));
    }

    #[test]
    fn at_flag_parses_rfc3339() {
        let cli = Cli::parse_from(["rota", "--at", "2026-10-16T09:00:00Z", "status"]);
        assert_eq!(
            cli.at.map(|at| at.to_rfc3339()),
            Some("2026-10-16T09:00:00+00:00".to_string())
        );
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["rota", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["rota", "init"],
            vec!["rota", "assign", "--seed", "1"],
            vec!["rota", "remind"],
            vec!["rota", "done"],
            vec!["rota", "pick", "Clean", "bathroom"],
            vec!["rota", "trigger", "trash", "is", "full"],
            vec!["rota", "share", "kitchen", "--with", "bo"],
            vec!["rota", "status", "--open"],
            vec!["rota", "stats", "--all"],
            vec!["rota", "simulate", "--weeks", "4"],
            vec!["rota", "import", "old.json"],
            vec!["rota", "completions", "zsh"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn share_requires_someone() {
        assert!(Cli::try_parse_from(["rota", "share", "kitchen"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
