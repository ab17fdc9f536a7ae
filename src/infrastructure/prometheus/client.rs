//! reqwest implementation of the `MetricsClient` port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use reqwest::{Client as ReqwestClient, Response, Url};
use std::time::Duration;
use tracing::{debug, instrument};

use super::error::from_status;
use super::types::ApiResponse;
use crate::domain::errors::PollError;
use crate::domain::models::QueryResult;
use crate::domain::ports::{MetricsClient, MetricsError, QueryRange};

/// HTTP client for the Prometheus query API
///
/// Speaks `/api/v1/query` and `/api/v1/query_range` against a single base
/// URL. Connections are pooled by the underlying `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http_client: ReqwestClient,
    base_url: String,
}

impl PrometheusClient {
    /// Create a client for `address` (e.g. `http://prometheus:9090`).
    pub fn new(address: &str, timeout: Duration) -> Result<Self, PollError> {
        let url = Url::parse(address).map_err(|e| {
            PollError::Configuration(format!("invalid backend address {address:?}: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PollError::Configuration(format!(
                "backend address {address:?} must use http or https"
            )));
        }

        let http_client = ReqwestClient::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| PollError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Pick one of `addresses` uniformly at random for this session.
    pub fn connect(addresses: &[String], timeout: Duration) -> Result<Self, PollError> {
        let address = addresses
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| PollError::Configuration("no backend addresses configured".to_string()))?;
        Self::new(address, timeout)
    }

    /// Base URL requests are sent to, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }

    async fn decode(response: Response) -> Result<QueryResult, MetricsError> {
        let status = response.status();
        let body = response.text().await?;

        // Error envelopes come back with 4xx/5xx; prefer their message.
        match serde_json::from_str::<ApiResponse>(&body) {
            Ok(envelope) => {
                if !envelope.warnings.is_empty() {
                    debug!(warnings = ?envelope.warnings, "backend returned warnings");
                }
                if status.is_success() || envelope.status == "error" {
                    envelope.into_result()
                } else {
                    Err(from_status(status, body))
                }
            }
            Err(_) if !status.is_success() => Err(from_status(status, body)),
            Err(e) => Err(MetricsError::Decode(e.to_string())),
        }
    }
}

/// Unix seconds with millisecond precision, as the API expects.
fn unix_seconds(at: DateTime<Utc>) -> String {
    format!("{}.{:03}", at.timestamp(), at.timestamp_subsec_millis())
}

#[async_trait]
impl MetricsClient for PrometheusClient {
    #[instrument(skip(self), fields(backend = %self.base_url))]
    async fn instant_query(
        &self,
        query: &str,
        at: DateTime<Utc>,
    ) -> Result<QueryResult, MetricsError> {
        let response = self
            .http_client
            .get(self.endpoint("query"))
            .query(&[("query", query), ("time", unix_seconds(at).as_str())])
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self), fields(backend = %self.base_url))]
    async fn range_query(
        &self,
        query: &str,
        range: QueryRange,
    ) -> Result<QueryResult, MetricsError> {
        let step = range.step.as_secs_f64().to_string();
        let response = self
            .http_client
            .get(self.endpoint("query_range"))
            .query(&[
                ("query", query),
                ("start", unix_seconds(range.start).as_str()),
                ("end", unix_seconds(range.end).as_str()),
                ("step", step.as_str()),
            ])
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = PrometheusClient::new("http://prom:9090/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://prom:9090");
        assert_eq!(client.endpoint("query"), "http://prom:9090/api/v1/query");
    }

    #[test]
    fn test_new_keeps_path_prefix() {
        let client =
            PrometheusClient::new("https://metrics/prometheus", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("query_range"),
            "https://metrics/prometheus/api/v1/query_range"
        );
    }

    #[test]
    fn test_new_rejects_bad_addresses() {
        assert!(matches!(
            PrometheusClient::new("not a url", Duration::from_secs(1)),
            Err(PollError::Configuration(_))
        ));
        assert!(matches!(
            PrometheusClient::new("ftp://prom", Duration::from_secs(1)),
            Err(PollError::Configuration(_))
        ));
    }

    #[test]
    fn test_connect_requires_an_address() {
        let err = PrometheusClient::connect(&[], Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("no backend addresses"));
    }

    #[test]
    fn test_connect_picks_a_configured_address() {
        let addresses = vec!["http://a:9090".to_string(), "http://b:9090".to_string()];
        let client = PrometheusClient::connect(&addresses, Duration::from_secs(1)).unwrap();
        assert!(addresses.iter().any(|a| a == client.base_url()));
    }

    #[test]
    fn test_unix_seconds() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_250).unwrap();
        assert_eq!(unix_seconds(at), "1700000000.250");
    }
}
