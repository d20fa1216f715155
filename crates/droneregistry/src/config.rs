//! Configuration management for droneregistry.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "droneregistry";

/// Default local ledger database file name.
const DATABASE_FILE_NAME: &str = "ledger.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `DRONEREG_`, sections split by `__`)
/// 2. TOML config file at `~/.config/droneregistry/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger backend configuration.
    pub ledger: LedgerConfig,
    /// Registry key layout.
    pub registry: RegistryConfig,
    /// Synchronization tuning.
    pub sync: SyncConfig,
    /// Wallet session.
    pub session: SessionConfig,
}

/// Ledger backend configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Path to the local ledger database.
    /// Defaults to `~/.local/share/droneregistry/ledger.db`
    pub database_path: Option<PathBuf>,
}

/// Where the registry lives on the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Key holding the identifier index.
    pub index_key: String,
    /// Prefix joined with a record id to form its key.
    pub record_prefix: String,
    /// Replace a corrupt index on append instead of failing.
    pub overwrite_corrupt_index: bool,
}

/// Synchronization tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Deadline for each ledger call in milliseconds.
    pub request_timeout_ms: u64,
    /// Maximum record fetches in flight during a sync.
    pub max_concurrent_fetches: usize,
    /// Battery percentage below which a drone counts as low.
    pub low_battery_threshold: u8,
}

/// Wallet session configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Account used for writes when none is given on the command line.
    pub account: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            index_key: "drone_keys".to_string(),
            record_prefix: "drone_".to_string(),
            overwrite_corrupt_index: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            max_concurrent_fetches: 8,
            low_battery_threshold: 30,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("DRONEREG_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.registry.index_key.is_empty() {
            return Err(invalid("index_key must not be empty"));
        }

        if self.registry.record_prefix.is_empty() {
            return Err(invalid("record_prefix must not be empty"));
        }

        // A record id equal to the remainder of the index key would alias it.
        if let Some(rest) = self
            .registry
            .index_key
            .strip_prefix(&self.registry.record_prefix)
        {
            if rest.starts_with("drone-") {
                return Err(invalid(format!(
                    "index_key '{}' collides with generated record keys",
                    self.registry.index_key
                )));
            }
        }

        if self.sync.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms must be greater than 0"));
        }

        if self.sync.max_concurrent_fetches == 0 {
            return Err(invalid("max_concurrent_fetches must be greater than 0"));
        }

        if self.sync.low_battery_threshold > 100 {
            return Err(invalid(format!(
                "low_battery_threshold ({}) cannot be greater than 100",
                self.sync.low_battery_threshold
            )));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.ledger
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the per-call ledger deadline as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.request_timeout_ms)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
