//! Layered configuration loading and validation.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Default project config file, read from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "promquery.yaml";

/// Prefix for environment overrides, e.g. `PROMQUERY_POLL__INTERVAL_SECS=10`
pub const ENV_PREFIX: &str = "PROMQUERY_";

/// Longest accepted baseline lookback: one leap year, in minutes
pub const MAX_LOOKBACK_MINS: u64 = 366 * 24 * 60;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No usable backend address.
    #[error("No backend addresses configured. Set backend.addresses or pass --addr")]
    NoAddresses,

    /// Polling interval of zero.
    #[error("Invalid interval_secs: {0}. Must be at least 1")]
    InvalidInterval(u64),

    /// Baseline step of zero.
    #[error("Invalid step_secs: {0}. Must be at least 1")]
    InvalidStep(u64),

    /// Baseline lookback of zero or longer than a year.
    #[error("Invalid lookback_mins: {0}. Must be between 1 and 527040 (one year)")]
    InvalidLookback(u64),

    /// The window would hold less than one step.
    #[error("Invalid baseline window: step ({step_secs}s) is longer than lookback ({lookback_secs}s)")]
    StepExceedsLookback {
        /// Configured step.
        step_secs: u64,
        /// Configured lookback, in seconds.
        lookback_secs: u64,
    },

    /// Unknown log level name.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `promquery.yaml` in the working directory, or `path` when given
    /// 3. Environment variables (`PROMQUERY_*`, `__` separates nested keys)
    ///
    /// Command-line flags are applied on top by the caller, which then runs
    /// [`ConfigLoader::validate`].
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let file = path.map_or_else(|| Path::new(DEFAULT_CONFIG_FILE).to_path_buf(), Path::to_path_buf);
        if let Some(explicit) = path {
            if !explicit.exists() {
                anyhow::bail!("config file {} does not exist", explicit.display());
            }
        }

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration (file: {})", file.display()))
    }

    /// Load configuration from a specific file, without environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Validate a fully merged configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.backend.addresses.iter().all(|a| a.trim().is_empty()) {
            return Err(ConfigError::NoAddresses);
        }

        let poll = &config.poll;
        if poll.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval(poll.interval_secs));
        }
        if poll.step_secs == 0 {
            return Err(ConfigError::InvalidStep(poll.step_secs));
        }
        if poll.lookback_mins == 0 || poll.lookback_mins > MAX_LOOKBACK_MINS {
            return Err(ConfigError::InvalidLookback(poll.lookback_mins));
        }
        if poll.step() > poll.lookback() {
            return Err(ConfigError::StepExceedsLookback {
                step_secs: poll.step_secs,
                lookback_secs: poll.lookback().as_secs(),
            });
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
