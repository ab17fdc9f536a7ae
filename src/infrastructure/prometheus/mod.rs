//! Prometheus HTTP API adapter
//!
//! Implements the `MetricsClient` port against `/api/v1/query` and
//! `/api/v1/query_range`.

pub mod client;
pub mod error;
pub mod types;

pub use client::PrometheusClient;
pub use types::{ApiData, ApiResponse};
