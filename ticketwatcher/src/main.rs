//! TicketWatcher CLI.
//!
//! `handle` is the GitHub Actions entry point: it reads the webhook payload
//! named by `GITHUB_EVENT_PATH` and runs triage against the GitHub and
//! oracle adapters. `parse-stack` and `check-diff` run the pure pieces
//! locally for debugging tickets and oracle diffs.

use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ticketwatcher::core::budget::{BudgetCheck, check_budget};
use ticketwatcher::core::diff::diff_stats;
use ticketwatcher::core::stackparse::{DEFAULT_LIMIT, RepoAnchor, parse_stack_text};
use ticketwatcher::core::state::TriageState;
use ticketwatcher::exit_codes;
use ticketwatcher::io::config::{TicketWatcherConfig, load_config_with_env};
use ticketwatcher::io::event::{IssueCommentEvent, IssueEvent, load_event};
use ticketwatcher::io::github::GithubHost;
use ticketwatcher::io::oracle::OpenAiOracle;
use ticketwatcher::logging;
use ticketwatcher::triage::{Triage, TriageOutcome};

const DEFAULT_CONFIG: &str = ".ticketwatcher.toml";

#[derive(Parser)]
#[command(
    name = "ticketwatcher",
    version,
    about = "Turn bug tickets into draft pull requests"
)]
struct Cli {
    /// Path to the TOML config (missing file = defaults).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle an `issues` or `issue_comment` webhook payload.
    Handle {
        /// Event payload file (default: `$GITHUB_EVENT_PATH`).
        #[arg(long)]
        event_file: Option<PathBuf>,
        /// Event name (default: `$GITHUB_EVENT_NAME`).
        #[arg(long)]
        event_name: Option<String>,
    },
    /// Print the file/line hints found in ticket text.
    ParseStack {
        /// Text file to scan (default: stdin).
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Print unified-diff stats and the budget verdict.
    CheckDiff {
        #[arg(long)]
        file: PathBuf,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config_with_env(&cli.config)?;
    match cli.command {
        Command::Handle {
            event_file,
            event_name,
        } => cmd_handle(&config, event_file, event_name),
        Command::ParseStack { file, limit } => cmd_parse_stack(&config, file.as_deref(), limit),
        Command::CheckDiff { file } => cmd_check_diff(&config, &file),
    }
}

fn cmd_handle(
    config: &TicketWatcherConfig,
    event_file: Option<PathBuf>,
    event_name: Option<String>,
) -> Result<i32> {
    let event_path = event_file
        .or_else(|| env::var_os("GITHUB_EVENT_PATH").map(PathBuf::from))
        .filter(|path| path.exists())
        .context("No event file found. Provide --event-file or run in GitHub Actions.")?;
    let event_name = event_name
        .or_else(|| env::var("GITHUB_EVENT_NAME").ok())
        .unwrap_or_default();
    if event_name != "issues" && event_name != "issue_comment" {
        println!("Event {event_name} not handled; exiting.");
        return Ok(exit_codes::OK);
    }

    let token = env::var("GITHUB_TOKEN")
        .or_else(|_| env::var("GH_TOKEN"))
        .context("GITHUB_TOKEN (or GH_TOKEN) is not set")?;
    let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
    let timeout = Duration::from_secs(config.http_timeout_secs);
    let host = GithubHost::new(&config.github, &token, timeout)?;
    let oracle = OpenAiOracle::new(&config.oracle, api_key, timeout)?;
    let triage = Triage::new(&host, &oracle, config);

    let outcome = if event_name == "issues" {
        let event: IssueEvent = load_event(&event_path)?;
        triage.process_ticket_opened(&event)?
    } else {
        let event: IssueCommentEvent = load_event(&event_path)?;
        triage.process_ticket_comment_added(&event)?
    };
    Ok(report(&outcome))
}

fn report(outcome: &TriageOutcome) -> i32 {
    match &outcome.pr_url {
        Some(url) => println!("PR_URL={url}"),
        None => println!("No action taken."),
    }
    if outcome.state == TriageState::Failed {
        return exit_codes::FAILED;
    }
    exit_codes::OK
}

fn cmd_parse_stack(config: &TicketWatcherConfig, file: Option<&Path>, limit: usize) -> Result<i32> {
    let text = match file {
        Some(path) => fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read ticket text from stdin")?;
            buf
        }
    };
    let anchor = RepoAnchor {
        root: &config.repo_root,
        name: &config.repo_name,
    };
    for location in parse_stack_text(&text, anchor, &config.policy(), limit) {
        match location.line {
            Some(line) => println!("{}:{line}", location.path),
            None => println!("{}", location.path),
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_check_diff(config: &TicketWatcherConfig, file: &Path) -> Result<i32> {
    let diff = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let stats = diff_stats(&diff);
    println!(
        "files={} lines={}",
        stats.files_touched, stats.changed_lines
    );
    match check_budget(stats, config.max_files, config.max_lines) {
        BudgetCheck::Ok => println!("within budget"),
        BudgetCheck::Exceeded {
            max_files,
            max_lines,
            ..
        } => println!("exceeds budget (max_files={max_files}, max_lines={max_lines})"),
    }
    Ok(exit_codes::OK)
}
