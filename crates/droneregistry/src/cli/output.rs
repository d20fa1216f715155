//! Text and JSON rendering for CLI output.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::DateTime;
use serde::Serialize;

use super::OutputFormat;
use crate::config::Config;
use crate::record::DroneRecord;
use crate::sync::SyncStatus;
use crate::view::{RegistryView, ViewStats};

/// Everything `dronereg status` reports.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    /// Whether the ledger answered the availability check.
    pub available: bool,
    /// Ledger database file.
    pub database_path: PathBuf,
    /// Connected account, if any.
    pub account: Option<String>,
    /// How the refresh before reporting ended.
    pub sync: SyncStatus,
    /// Records skipped by that refresh.
    pub skipped: usize,
    /// Counters over the view.
    pub stats: ViewStats,
}

/// Render a view in the requested format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_view(view: &RegistryView, format: OutputFormat) -> serde_json::Result<String> {
    let out = match format {
        OutputFormat::Json => serde_json::to_string_pretty(view.records())?,
        OutputFormat::Plain => view
            .records()
            .iter()
            .map(|r| {
                format!(
                    "{} {} {}% {} {}",
                    r.id,
                    r.status,
                    r.battery,
                    r.display_position(),
                    format_time(r.timestamp)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Table => render_table(view.records()),
    };
    Ok(out)
}

fn render_table(records: &[DroneRecord]) -> String {
    if records.is_empty() {
        return "No drones registered.".to_string();
    }

    let id_width = records
        .iter()
        .map(|r| r.id.as_str().len())
        .max()
        .unwrap_or(0)
        .max("ID".len());
    let status_width = records
        .iter()
        .map(|r| r.status.as_str().len())
        .max()
        .unwrap_or(0)
        .max("STATUS".len());

    let mut out = format!(
        "{:<id_width$}  {:<status_width$}  {:>7}  {:<19}  POSITION\n",
        "ID", "STATUS", "BATTERY", "REGISTERED"
    );
    for r in records {
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<status_width$}  {:>6}%  {:<19}  {}",
            r.id.as_str(),
            r.status.as_str(),
            r.battery,
            format_time(r.timestamp),
            r.display_position()
        );
    }
    out.truncate(out.trim_end().len());
    out
}

fn format_time(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map_or_else(|| timestamp.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Render the status summary.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_status(summary: &StatusSummary, json: bool) -> serde_json::Result<String> {
    if json {
        return serde_json::to_string_pretty(summary);
    }

    let mut out = String::new();
    let _ = writeln!(out, "dronereg status");
    let _ = writeln!(out, "---------------");
    let _ = writeln!(
        out,
        "Ledger:        {}",
        if summary.available { "available" } else { "unavailable" }
    );
    let _ = writeln!(out, "Database:      {}", summary.database_path.display());
    let _ = writeln!(
        out,
        "Account:       {}",
        summary.account.as_deref().unwrap_or("not connected")
    );
    let _ = writeln!(out, "Last sync:     {}", summary.sync);
    if summary.skipped > 0 {
        let _ = writeln!(out, "Skipped:       {} unreadable record(s)", summary.skipped);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Drones:        {}", summary.stats.total);
    let _ = writeln!(out, "  Active:      {}", summary.stats.active);
    let _ = writeln!(out, "  Idle:        {}", summary.stats.idle);
    let _ = writeln!(out, "  Maintenance: {}", summary.stats.maintenance);
    let _ = writeln!(out, "  Other:       {}", summary.stats.other);
    let _ = write!(out, "Low battery:   {}", summary.stats.low_battery);
    Ok(out)
}

/// Render the effective configuration for humans.
#[must_use]
pub fn render_config(config: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Current Configuration");
    let _ = writeln!(out, "=====================");
    let _ = writeln!(out);
    let _ = writeln!(out, "[Ledger]");
    let _ = writeln!(out, "  Database path:        {}", config.database_path().display());
    let _ = writeln!(out);
    let _ = writeln!(out, "[Registry]");
    let _ = writeln!(out, "  Index key:            {}", config.registry.index_key);
    let _ = writeln!(out, "  Record prefix:        {}", config.registry.record_prefix);
    let _ = writeln!(
        out,
        "  Overwrite corrupt:    {}",
        config.registry.overwrite_corrupt_index
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "[Sync]");
    let _ = writeln!(out, "  Request timeout (ms): {}", config.sync.request_timeout_ms);
    let _ = writeln!(
        out,
        "  Concurrent fetches:   {}",
        config.sync.max_concurrent_fetches
    );
    let _ = writeln!(
        out,
        "  Low battery below:    {}%",
        config.sync.low_battery_threshold
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "[Session]");
    let _ = write!(
        out,
        "  Account:              {}",
        config.session.account.as_deref().unwrap_or("(none)")
    );
    out
}
