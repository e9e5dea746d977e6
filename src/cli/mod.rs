//! CLI module for superloop - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the loop and
//! for the operator actions around it (status, approve, cancel, reset, report).

pub mod commands;

pub use commands::Cli;
