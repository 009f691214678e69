//! Configuration module for knorten-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::FileConfig;
use knorten_core::config::DispatcherConfig;
use knorten_sdk::objects::EventClass;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub dispatcher: DispatcherConfig,
    pub paused_classes: Vec<EventClass>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read the TOML file, apply CLI overrides and validate.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        Ok(build_loaded_config(file_config))
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let dispatcher = &config.dispatcher;
    if dispatcher.tick_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher.tick_interval_secs must be positive".to_string(),
        ));
    }
    if dispatcher.error_grace_secs < 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher.error_grace_secs must not be negative".to_string(),
        ));
    }
    if dispatcher.max_retries < 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher.max_retries must not be negative".to_string(),
        ));
    }
    if dispatcher.max_concurrent_workers == Some(0) {
        return Err(ConfigError::ValidationError(
            "dispatcher.max_concurrent_workers must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let dispatcher = file_config.dispatcher;
    let mut paused_classes = file_config.maintenance.paused_classes;
    paused_classes.sort();
    paused_classes.dedup();

    LoadedConfig {
        listen: file_config.server.listen,
        dispatcher: DispatcherConfig {
            tick_interval: Duration::from_secs(dispatcher.tick_interval_secs),
            error_grace: time::Duration::seconds(dispatcher.error_grace_secs),
            max_retries: dispatcher.max_retries,
            max_concurrent_workers: dispatcher.max_concurrent_workers,
        },
        paused_classes,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
