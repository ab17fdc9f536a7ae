//! Port to the metrics backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::models::QueryResult;

/// Errors that can occur when talking to the metrics backend
///
/// Transport specifics stay in the client implementation; it maps them onto
/// these variants.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The backend rejected the request parameters (HTTP 400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The query could not be executed (HTTP 422)
    #[error("Query execution failed: {0}")]
    ExecutionFailed(String),

    /// The backend hit an internal error (5xx)
    #[error("Backend server error: {0}")]
    ServerError(String),

    /// The backend is unavailable or overloaded (HTTP 503)
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The request timed out
    #[error("Timeout waiting for response")]
    Timeout,

    /// The request could not be sent or the connection failed
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The response body could not be decoded
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// The backend answered with `"status": "error"`
    #[error("Backend returned {error_type} error: {message}")]
    Api {
        /// Prometheus `errorType`, e.g. `bad_data`
        error_type: String,
        /// Prometheus `error` message
        message: String,
    },

    /// Unknown error occurred
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl MetricsError {
    /// Returns true if this error is transient and the next poll may succeed
    ///
    /// # Examples
    ///
    /// ```
    /// use promquery::domain::ports::MetricsError;
    ///
    /// assert!(MetricsError::Timeout.is_transient());
    /// assert!(!MetricsError::InvalidRequest("bad step".to_string()).is_transient());
    /// ```
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ServerError(_) | Self::Unavailable(_) | Self::Timeout | Self::NetworkError(_)
        )
    }
}

/// Time window and resolution for a range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRange {
    /// First evaluation time.
    pub start: DateTime<Utc>,
    /// Last evaluation time.
    pub end: DateTime<Utc>,
    /// Distance between evaluations.
    pub step: Duration,
}

/// Metrics backend operations
///
/// Implementations return the raw result shape; enforcing the single-series
/// contract is the caller's job.
#[async_trait]
pub trait MetricsClient: Send + Sync {
    /// Evaluate `query` at a single point in time.
    async fn instant_query(
        &self,
        query: &str,
        at: DateTime<Utc>,
    ) -> Result<QueryResult, MetricsError>;

    /// Evaluate `query` over `range`, one point per step.
    async fn range_query(
        &self,
        query: &str,
        range: QueryRange,
    ) -> Result<QueryResult, MetricsError>;
}
