//! Mapping of HTTP transport failures onto [`MetricsError`].

use reqwest::StatusCode;

use crate::domain::ports::MetricsError;

/// Map an HTTP status code and response body to an error variant
///
/// - 400: Invalid request
/// - 422: Query execution failed
/// - 503: Backend unavailable
/// - Other 5xx: Server error
/// - Other: Unknown error
pub fn from_status(status: StatusCode, body: String) -> MetricsError {
    match status.as_u16() {
        400 => MetricsError::InvalidRequest(body),
        422 => MetricsError::ExecutionFailed(body),
        503 => MetricsError::Unavailable(body),
        500..=599 => MetricsError::ServerError(body),
        _ => MetricsError::Unknown(format!("HTTP {status}: {body}")),
    }
}

impl From<reqwest::Error> for MetricsError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::NetworkError(error.to_string())
        }
    }
}
