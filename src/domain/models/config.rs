//! Configuration tree, deserialized from defaults, YAML and environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration structure for the poller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Metrics backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Polling and baseline configuration
    #[serde(default)]
    pub poll: PollConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metrics backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackendConfig {
    /// Candidate backend base URLs; one is picked at random per session
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

const fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            addresses: vec![],
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BackendConfig {
    /// Per-request HTTP timeout.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// What `initialize_baselines` does when a query's baseline cannot be captured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineFailurePolicy {
    /// Log the failure and leave the query out of the wait
    #[default]
    Exclude,
    /// Fail initialization with the first error once every estimate finished
    Abort,
}

impl FromStr for BaselineFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exclude" => Ok(Self::Exclude),
            "abort" => Ok(Self::Abort),
            other => Err(format!(
                "unknown baseline failure policy '{other}' (expected exclude or abort)"
            )),
        }
    }
}

/// Polling and baseline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PollConfig {
    /// Seconds between samples of the same query
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Overall deadline for the wait, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// In-tolerance samples required beyond the first before a query converges.
    /// `0` converges on the first in-tolerance sample.
    #[serde(default)]
    pub required_successes: u32,

    /// Length of the history window used for the baseline, in minutes
    #[serde(default = "default_lookback_mins")]
    pub lookback_mins: u64,

    /// Resolution of the history window, in seconds
    #[serde(default = "default_step_secs")]
    pub step_secs: u64,

    /// How far in the past queries are evaluated so only fully scraped data is read
    #[serde(default = "default_scrape_lag_secs")]
    pub scrape_lag_secs: u64,

    /// What to do when a baseline cannot be captured
    #[serde(default)]
    pub baseline_failure: BaselineFailurePolicy,
}

const fn default_interval_secs() -> u64 {
    30
}

const fn default_timeout_secs() -> u64 {
    120
}

const fn default_lookback_mins() -> u64 {
    30
}

const fn default_step_secs() -> u64 {
    30
}

const fn default_scrape_lag_secs() -> u64 {
    30
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            required_successes: 0,
            lookback_mins: default_lookback_mins(),
            step_secs: default_step_secs(),
            scrape_lag_secs: default_scrape_lag_secs(),
            baseline_failure: BaselineFailurePolicy::default(),
        }
    }
}

impl PollConfig {
    /// Pause between samples of one query.
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Overall wait deadline.
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Length of the baseline history window, saturating on overflow.
    pub const fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_mins.saturating_mul(60))
    }

    /// Resolution of the baseline history window.
    pub const fn step(&self) -> Duration {
        Duration::from_secs(self.step_secs)
    }

    /// How far in the past every query is evaluated.
    pub const fn scrape_lag(&self) -> Duration {
        Duration::from_secs(self.scrape_lag_secs)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable, multi-line
    #[default]
    Pretty,
}

/// Rotation policy for file logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// New file every day
    #[default]
    Daily,
    /// New file every hour
    Hourly,
    /// Single file
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for log files (optional, if None logs only to stderr)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log rotation policy for file output
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.backend.addresses.is_empty());
        assert_eq!(config.poll.interval(), Duration::from_secs(30));
        assert_eq!(config.poll.timeout(), Duration::from_secs(120));
        assert_eq!(config.poll.required_successes, 0);
        assert_eq!(config.poll.lookback(), Duration::from_secs(1800));
        assert_eq!(config.poll.baseline_failure, BaselineFailurePolicy::Exclude);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_huge_lookback_saturates() {
        let poll = PollConfig {
            lookback_mins: u64::MAX / 10,
            ..PollConfig::default()
        };
        assert_eq!(poll.lookback(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r"
backend:
  addresses: [http://prom:9090]
poll:
  interval_secs: 5
  baseline_failure: abort
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.backend.addresses, vec!["http://prom:9090"]);
        assert_eq!(config.backend.request_timeout_secs, 10);
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.poll.step_secs, 30);
        assert_eq!(config.poll.baseline_failure, BaselineFailurePolicy::Abort);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("ABORT".parse::<BaselineFailurePolicy>(), Ok(BaselineFailurePolicy::Abort));
        assert_eq!("exclude".parse::<BaselineFailurePolicy>(), Ok(BaselineFailurePolicy::Exclude));
        assert!("ignore".parse::<BaselineFailurePolicy>().is_err());
    }
}
