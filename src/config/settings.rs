//! Configuration settings for hound.
//!
//! Settings are loaded from `~/.hound/config.yaml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Paths;
use crate::error::HoundError;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Session runtime settings.
    pub runtime: RuntimeConfig,
    /// Training defaults.
    pub training: TrainingConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Storage settings.
    pub storage: StorageConfig,
}

/// Session runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Step timer cadence in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// How often finished sessions are swept, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// How long a completed session stays addressable, in seconds.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Fixed seed for step plans (random when unset).
    #[serde(default)]
    pub plan_seed: Option<u64>,
}

/// Training defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TrainingConfig {
    /// User id recorded when `--user` is not given.
    #[serde(default)]
    pub default_user: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `HOUND_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file (defaults to `~/.hound/hound.db`).
    #[serde(default)]
    pub database: Option<PathBuf>,
}

// Default value functions for serde
const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_sweep_interval_secs() -> u64 {
    300 // 5 minutes
}

const fn default_retention_secs() -> u64 {
    3600 // 1 hour
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
            retention_secs: default_retention_secs(),
            plan_seed: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl RuntimeConfig {
    /// Step timer cadence. Never zero.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Sweep cadence. Never zero.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Retention window for completed sessions.
    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        let secs = i64::try_from(self.retention_secs).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, HoundError> {
        let paths = Paths::new()?;
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, HoundError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            HoundError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            HoundError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Database file to use, honouring `storage.database`.
    #[must_use]
    pub fn database_path(&self, paths: &Paths) -> PathBuf {
        self.storage
            .database
            .clone()
            .unwrap_or_else(|| paths.database.clone())
    }
}
