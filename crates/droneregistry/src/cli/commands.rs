//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::record::{DroneStatus, NewDrone, RecordId};

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Free-form position, e.g. "47.6 N, 122.3 W"
    #[arg(short, long, default_value = "")]
    pub position: String,

    /// Status: idle, active, maintenance, or any other label
    #[arg(short, long, default_value = "idle", value_parser = parse_status)]
    pub status: DroneStatus,

    /// Battery level in percent
    #[arg(short, long, default_value = "100", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub battery: u8,
}

impl AddCommand {
    /// The fields to append.
    #[must_use]
    pub fn to_new_drone(&self) -> NewDrone {
        NewDrone::new(self.position.clone(), self.status.clone(), self.battery)
    }
}

/// Reindex command arguments.
#[derive(Debug, Args)]
pub struct ReindexCommand {
    /// Identifier reported by a failed add
    pub id: String,
}

impl ReindexCommand {
    /// The record to index.
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        RecordId::from(self.id.as_str())
    }
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One line per drone
    Plain,
    /// Aligned columns
    #[default]
    Table,
    /// JSON array
    Json,
}

fn parse_status(value: &str) -> Result<DroneStatus, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("status must not be empty".to_string());
    }
    Ok(DroneStatus::from(value.to_ascii_lowercase()))
}
