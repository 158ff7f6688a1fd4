//! Configuration management for hound.
//!
//! This module handles loading configuration from `~/.hound/`.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{Config, LoggingConfig, RuntimeConfig, StorageConfig, TrainingConfig};
