//! Port trait definitions (Hexagonal Architecture)
//!
//! - MetricsClient: instant and range queries against the metrics backend
//!
//! The services depend only on these traits, so tests can drive the poller
//! with a scripted backend.

pub mod metrics_client;

pub use metrics_client::{MetricsClient, MetricsError, QueryRange};
