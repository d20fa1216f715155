//! `dronereg` - CLI for droneregistry
//!
//! This binary syncs a local view of the drone registry from the ledger and
//! registers new drones.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use droneregistry::cli::{
    render_config, render_status, render_view, AddCommand, Cli, Command, ConfigCommand,
    ListCommand, ReindexCommand, StatusCommand, StatusSummary,
};
use droneregistry::{init_logging, Config, Error, Registry, Session, SqliteLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Config(ref cmd) => handle_config(&config, cmd),
        ref command => {
            let registry = open_registry(&cli, &config)?;
            match command {
                Command::List(cmd) => handle_list(&registry, cmd).await,
                Command::Add(cmd) => handle_add(&registry, cmd).await,
                Command::Reindex(cmd) => handle_reindex(&registry, cmd).await,
                Command::Status(cmd) => handle_status(&registry, &config, cmd).await,
                Command::Config(_) => Ok(()),
            }
        }
    }
}

fn open_registry(cli: &Cli, config: &Config) -> anyhow::Result<Registry> {
    let path = config.database_path();
    let ledger = SqliteLedger::open(&path)
        .with_context(|| format!("failed to open ledger at {}", path.display()))?;

    let session = match cli.account_or(config.session.account.as_deref()) {
        Some(account) => Session::connected(account),
        None => Session::new(),
    };

    Ok(Registry::new(Arc::new(ledger), config, session))
}

async fn handle_list(registry: &Registry, cmd: &ListCommand) -> anyhow::Result<()> {
    let report = registry.sync().await;
    if report.is_unavailable() {
        bail!("ledger unavailable");
    }
    if report.skipped() > 0 {
        eprintln!("warning: {} record(s) could not be read", report.skipped());
    }
    if report.stats.battery_out_of_range > 0 {
        eprintln!(
            "warning: {} drone(s) report a battery above 100%",
            report.stats.battery_out_of_range
        );
    }
    if report.stats.index_corrupt {
        eprintln!("warning: registry index is corrupt, showing no drones");
    }
    println!("{}", render_view(&report.view, cmd.format)?);
    Ok(())
}

async fn handle_add(registry: &Registry, cmd: &AddCommand) -> anyhow::Result<()> {
    match registry.append(cmd.to_new_drone()).await {
        Ok(report) => {
            println!("Registered {}", report.id());
            if !report.refresh.is_published() {
                eprintln!("warning: drone stored, but the list could not be refreshed");
            }
            Ok(())
        }
        Err(err @ Error::PartialAppend { .. }) => {
            if let Some(id) = err.unindexed_record() {
                eprintln!("Drone {id} was stored but is not listed yet.");
                eprintln!("Run `dronereg reindex {id}` to finish registering it.");
            }
            Err(err.into())
        }
        Err(Error::NotAuthenticated) => {
            bail!("no account connected; pass --account or set session.account")
        }
        Err(err) => Err(err.into()),
    }
}

async fn handle_reindex(registry: &Registry, cmd: &ReindexCommand) -> anyhow::Result<()> {
    let id = cmd.record_id();
    let report = registry
        .retry_index(&id)
        .await
        .with_context(|| format!("failed to index {id}"))?;
    if report.view.contains(&id) {
        println!("Indexed {id}");
    } else {
        println!("Indexed {id}, but it is not readable yet");
    }
    Ok(())
}

async fn handle_status(
    registry: &Registry,
    config: &Config,
    cmd: &StatusCommand,
) -> anyhow::Result<()> {
    let available = registry.is_available().await;
    let report = registry.sync().await;

    let summary = StatusSummary {
        available,
        database_path: config.database_path(),
        account: registry.session().account(),
        sync: report.status,
        skipped: report.skipped(),
        stats: registry.stats(),
    };
    println!("{}", render_status(&summary, cmd.json)?);
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("{}", render_config(config));
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.clone().unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
