//! Promquery - wait for Prometheus metrics to settle
//!
//! Captures a baseline for each query (its latest value and the standard
//! deviation over a history window), then polls until every query is back
//! within that band or a deadline passes. Typical use is as a gate in a
//! deployment pipeline.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): query expressions, baselines, errors and ports
//! - **Service Layer** (`services`): baseline capture, watchers and the poller
//! - **Infrastructure Layer** (`infrastructure`): Prometheus client, config, logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use promquery::{PollConfig, Poller};
//! use promquery::domain::models::BackendConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), promquery::PollError> {
//! let backend = BackendConfig {
//!     addresses: vec!["http://localhost:9090".to_string()],
//!     ..BackendConfig::default()
//! };
//! let config = PollConfig::default();
//! let mut poller = Poller::connect(&backend, ["rate(http_errors_total[5m])"], config.clone())?;
//!
//! let cancel = CancellationToken::new();
//! poller.initialize_baselines(&cancel).await?;
//! poller.wait(config.interval(), config.timeout(), &cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ErrorClass, PollError, QueryError};
pub use domain::models::{
    Band, Baseline, BaselineFailurePolicy, Config, LoggingConfig, PollConfig,
};
pub use domain::ports::{MetricsClient, MetricsError, QueryRange};
pub use domain::query::{MatchKind, QueryExpression};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::prometheus::PrometheusClient;
pub use services::{BaselineSummary, Poller};
