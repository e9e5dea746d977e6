//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: drive the loop until it completes, fails or halts
//! - status: show the persisted loop state
//! - approve: write the operator approval flag
//! - cancel: ask a running loop to stop
//! - reset: move the state aside and start over
//! - report: regenerate the timeline report

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Superloop - multi-role agent loop orchestrator
#[derive(Parser, Debug)]
#[command(name = "superloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Target repository (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub repo: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run iterations until the loop completes, fails or halts
    Run {
        /// Continue from stuck, awaiting_approval or test_failures
        #[arg(short, long)]
        force: bool,
    },

    /// Show the loop status and recent history
    Status {
        /// Number of history entries to show
        #[arg(short = 'n', long, default_value_t = 10)]
        last: usize,
    },

    /// Approve completion (writes the approval flag file)
    Approve,

    /// Ask a running loop to stop
    Cancel,

    /// Move the current state aside and start from idle
    Reset,

    /// Regenerate the timeline report
    Report {
        /// Print the report instead of only writing it
        #[arg(short, long)]
        print: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_force() {
        let cli = Cli::parse_from(["superloop", "run", "--force"]);
        assert_eq!(cli.command, Commands::Run { force: true });
        assert!(!cli.is_verbose());
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from(["superloop", "status", "-v", "--repo", "/tmp/app", "-n", "3"]);
        assert!(cli.is_verbose());
        assert_eq!(cli.repo, Some(PathBuf::from("/tmp/app")));
        assert_eq!(cli.command, Commands::Status { last: 3 });
    }

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::parse_from(["superloop", "--config", "loop.yml", "report", "--print"]);
        assert_eq!(cli.config, Some(PathBuf::from("loop.yml")));
        assert_eq!(cli.command, Commands::Report { print: true });
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["superloop"]).is_err());
    }
}
