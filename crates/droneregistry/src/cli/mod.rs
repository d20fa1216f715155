//! Command-line interface for droneregistry.
//!
//! This module provides the CLI structure and output rendering for the
//! `dronereg` binary.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    AddCommand, ConfigCommand, ListCommand, OutputFormat, ReindexCommand, StatusCommand,
};
pub use output::{render_config, render_status, render_view, StatusSummary};

/// dronereg - Inspect and extend a ledger-backed drone registry
///
/// Reads the registry index and records from the ledger, shows the current
/// fleet, and registers new drones.
#[derive(Debug, Parser)]
#[command(name = "dronereg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Account to write as (overrides session.account)
    #[arg(long, global = true, value_name = "ACCOUNT")]
    pub account: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sync with the ledger and list registered drones
    List(ListCommand),

    /// Register a new drone
    Add(AddCommand),

    /// Index a drone left unlisted by a failed add
    Reindex(ReindexCommand),

    /// Show ledger availability and fleet counters
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }

    /// The account to authenticate writes with, preferring the flag.
    #[must_use]
    pub fn account_or(&self, configured: Option<&str>) -> Option<String> {
        self.account
            .as_deref()
            .or(configured)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
    }
}
