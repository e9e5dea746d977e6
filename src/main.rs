use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use superloop::config::{LoopConfig, load_config};
use superloop::domain::{ExitStatus, LoopState, LoopStatus, RunOutcome};
use superloop::scheduler::{
    CancelToken, PhaseScheduler, cancel_file, clear_cancel_request, request_cancel, watch_cancel_file,
};
use superloop::storage::{FileStateStore, REPORT_FILE, StateStore, render_report, write_report};

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("superloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("superloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn resolve_repo(cli: &Cli) -> Result<PathBuf> {
    let repo = match &cli.repo {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    repo.canonicalize()
        .context(format!("Repository {} not found", repo.display()))
}

fn status_label(status: LoopStatus) -> ColoredString {
    match status {
        LoopStatus::Complete => status.as_str().green().bold(),
        LoopStatus::Failed => status.as_str().red().bold(),
        LoopStatus::InProgress => status.as_str().cyan(),
        LoopStatus::Idle => status.as_str().normal(),
        LoopStatus::AwaitingApproval | LoopStatus::Stuck | LoopStatus::TestFailures => status.as_str().yellow().bold(),
    }
}

async fn run_application(cli: &Cli, config: LoopConfig, repo: &Path) -> Result<()> {
    info!("Starting application for {}", repo.display());

    if cli.is_verbose() {
        println!("{} {}", "Repository:".yellow(), repo.display());
        println!("{} {}", "State dir:".yellow(), config.state_dir_in(repo).display());
    }

    match &cli.command {
        Commands::Run { force } => handle_run_command(config, repo, *force).await,
        Commands::Status { last } => handle_status_command(&config, repo, *last),
        Commands::Approve => handle_approve_command(&config, repo),
        Commands::Cancel => handle_cancel_command(&config, repo),
        Commands::Reset => handle_reset_command(&config, repo),
        Commands::Report { print } => handle_report_command(&config, repo, *print),
    }
}

async fn handle_run_command(config: LoopConfig, repo: &Path, force: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let state_dir = config.state_dir_in(repo);
    fs::create_dir_all(&state_dir).context("Failed to create state directory")?;
    if clear_cancel_request(&state_dir)? {
        info!("Discarded stale cancel request");
    }

    let poll = Duration::from_millis(config.cancel_poll_ms);
    let scheduler = PhaseScheduler::for_repo(config, repo);

    let cancel = CancelToken::new();
    let watcher = watch_cancel_file(cancel_file(&state_dir), cancel.clone(), poll);
    let ctrl_c = {
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "Cancelling after the current phase is stopped...".yellow());
                token.cancel();
            }
        })
    };

    println!("{} {}", "Running loop in".cyan(), repo.display());
    let outcome = scheduler.run(force, &cancel).await;

    watcher.abort();
    ctrl_c.abort();
    let _ = clear_cancel_request(&state_dir);

    match outcome.context("Loop aborted")? {
        RunOutcome::Complete => {
            println!("{}", "Loop complete".green().bold());
            Ok(())
        }
        RunOutcome::Halted { status, reason } => {
            println!("{} {}: {}", "Loop halted:".yellow().bold(), status_label(status), reason);
            match status {
                LoopStatus::AwaitingApproval => println!("  Run `superloop approve`, then `superloop run`."),
                _ => println!("  Fix the repository or configuration, then `superloop run --force`."),
            }
            Ok(())
        }
        RunOutcome::Failed(reason) => Err(eyre::eyre!("Loop failed: {}", reason)),
    }
}

fn handle_status_command(config: &LoopConfig, repo: &Path, last: usize) -> Result<()> {
    let store = FileStateStore::new(config.state_dir_in(repo));
    let mut state: LoopState = store.load().context("Failed to load state")?;
    config.pricing.reprice(&mut state);

    println!("{} {}", "Status:".green(), status_label(state.status));
    if let Some(reason) = &state.status_reason {
        println!("  Reason:     {}", reason);
    }
    println!("  Iteration:  {} / {}", state.iteration, config.max_iterations);
    if let Some(phase) = &state.current_phase {
        println!("  Phase:      {}", phase.cyan());
    }
    println!("  Phases run: {}", state.history.len());
    println!("  Stuck:      {}", state.stuck_counter);
    let usage = &state.cost_totals;
    println!(
        "  Tokens:     {} in / {} out / {} thinking / {} cached (~${:.4})",
        usage.input_tokens, usage.output_tokens, usage.thinking_tokens, usage.cached_tokens, usage.estimated_cost_usd
    );

    if let Some(summary) = state.gate_log.last() {
        let verdict = if summary.passed { "pass".green() } else { "fail".red() };
        println!("  Gates:      {} ({})", verdict, summary.detail);
    }

    let skip = state.history.len().saturating_sub(last);
    if skip < state.history.len() {
        println!("{}", "History:".green());
    }
    for record in state.history.iter().skip(skip) {
        let exit = match record.exit_status {
            ExitStatus::Success => record.exit_status.to_string().green(),
            _ => record.exit_status.to_string().red(),
        };
        println!(
            "  [{}] {:<12} {:<9} {:>7}ms  {}",
            record.iteration,
            record.phase,
            exit,
            record.duration_ms,
            record.reason.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn handle_approve_command(config: &LoopConfig, repo: &Path) -> Result<()> {
    if !config.gates.approval.enabled {
        println!("{}", "Approval gate is disabled; the flag has no effect.".yellow());
    }
    let flag = repo.join(&config.gates.approval.flag);
    if let Some(parent) = flag.parent() {
        fs::create_dir_all(parent).context("Failed to create approval flag directory")?;
    }
    fs::write(&flag, format!("approved {}\n", chrono::Utc::now().to_rfc3339()))
        .context(format!("Failed to write {}", flag.display()))?;
    info!("Approval flag written to {}", flag.display());
    println!("{} {}", "Approved:".green(), flag.display());
    Ok(())
}

fn handle_cancel_command(config: &LoopConfig, repo: &Path) -> Result<()> {
    let path = request_cancel(&config.state_dir_in(repo)).context("Failed to request cancellation")?;
    info!("Cancel requested via {}", path.display());
    println!("{} {}", "Cancel requested:".red(), path.display());
    Ok(())
}

fn handle_reset_command(config: &LoopConfig, repo: &Path) -> Result<()> {
    let state_dir = config.state_dir_in(repo);
    let store = FileStateStore::new(&state_dir);
    match store.reset().context("Failed to reset state")? {
        Some(backup) => println!("{} previous state kept at {}", "Reset:".yellow(), backup.display()),
        None => println!("{} no previous state", "Reset:".yellow()),
    }
    clear_cancel_request(&state_dir)?;
    write_report(&state_dir.join(REPORT_FILE), &store.load()?)?;
    Ok(())
}

fn handle_report_command(config: &LoopConfig, repo: &Path, print: bool) -> Result<()> {
    let state_dir = config.state_dir_in(repo);
    let mut state = FileStateStore::new(&state_dir).load().context("Failed to load state")?;
    config.pricing.reprice(&mut state);

    let path = state_dir.join(REPORT_FILE);
    write_report(&path, &state)?;
    if print {
        print!("{}", render_report(&state));
    } else {
        println!("{} {}", "Report:".green(), path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    let repo = resolve_repo(&cli)?;

    // Load configuration
    let config = load_config(cli.config.as_ref(), &repo).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, config, &repo).await.context("Application failed")?;

    Ok(())
}
