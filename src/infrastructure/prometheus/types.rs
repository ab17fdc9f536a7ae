//! Wire types for the Prometheus HTTP API response envelope.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::models::{InstantSample, QueryResult, RangeSeries};
use crate::domain::ports::MetricsError;

/// `[<unix time>, "<value>"]`
pub type SamplePair = (f64, String);

/// Top-level response body shared by every `/api/v1` endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    /// `success` or `error`.
    pub status: String,
    /// Present on success.
    #[serde(default)]
    pub data: Option<ApiData>,
    /// Error category on failure, e.g. `bad_data`.
    #[serde(rename = "errorType", default)]
    pub error_type: Option<String>,
    /// Error message on failure.
    #[serde(default)]
    pub error: Option<String>,
    /// Non-fatal notes from the query engine.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// `data` member of a query response; `result` is decoded once `resultType`
/// is known.
#[derive(Debug, Deserialize)]
pub struct ApiData {
    /// `vector`, `matrix`, `scalar` or `string`.
    #[serde(rename = "resultType")]
    pub result_type: String,
    /// Undecoded result payload.
    pub result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorEntry {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: SamplePair,
}

#[derive(Debug, Deserialize)]
struct MatrixEntry {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<SamplePair>,
}

impl ApiResponse {
    /// Unwrap a successful envelope into its result, or the API error it carries.
    pub fn into_result(self) -> Result<QueryResult, MetricsError> {
        if self.status != "success" {
            return Err(MetricsError::Api {
                error_type: self.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: self.error.unwrap_or_else(|| format!("status {}", self.status)),
            });
        }

        self.data
            .ok_or_else(|| MetricsError::Decode("response has no data".to_string()))?
            .into_result()
    }
}

impl ApiData {
    /// Decode `result` according to `result_type`.
    pub fn into_result(self) -> Result<QueryResult, MetricsError> {
        let decode = |e: serde_json::Error| {
            MetricsError::Decode(format!("{} result: {e}", self.result_type))
        };

        match self.result_type.as_str() {
            "vector" => {
                let entries: Vec<VectorEntry> =
                    serde_json::from_value(self.result.clone()).map_err(decode)?;
                Ok(QueryResult::Vector(
                    entries
                        .into_iter()
                        .map(|e| InstantSample {
                            labels: e.metric,
                            value: e.value.1,
                        })
                        .collect(),
                ))
            }
            "matrix" => {
                let entries: Vec<MatrixEntry> =
                    serde_json::from_value(self.result.clone()).map_err(decode)?;
                Ok(QueryResult::Matrix(
                    entries
                        .into_iter()
                        .map(|e| RangeSeries {
                            labels: e.metric,
                            values: e.values.into_iter().map(|(_, v)| v).collect(),
                        })
                        .collect(),
                ))
            }
            "scalar" => {
                let (_, value): SamplePair =
                    serde_json::from_value(self.result.clone()).map_err(decode)?;
                Ok(QueryResult::Scalar(value))
            }
            "string" => {
                let (_, value): SamplePair =
                    serde_json::from_value(self.result.clone()).map_err(decode)?;
                Ok(QueryResult::String(value))
            }
            other => Err(MetricsError::Decode(format!("unknown result type {other:?}"))),
        }
    }
}
