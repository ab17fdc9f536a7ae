//! Raw result shapes returned by the metrics backend.
//!
//! Values stay as the backend's string encoding (`"1.5"`, `"NaN"`, `"+Inf"`);
//! turning them into numbers is part of enforcing the query contract.

use std::collections::BTreeMap;

/// One series of an instant vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantSample {
    /// Series labels.
    pub labels: BTreeMap<String, String>,
    /// Sample value as encoded by the backend.
    pub value: String,
}

/// One series of a range matrix, values ordered oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSeries {
    /// Series labels.
    pub labels: BTreeMap<String, String>,
    /// Sample values as encoded by the backend.
    pub values: Vec<String>,
}

/// The decoded `data.result` of a query response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// `resultType: vector`
    Vector(Vec<InstantSample>),
    /// `resultType: matrix`
    Matrix(Vec<RangeSeries>),
    /// `resultType: scalar`
    Scalar(String),
    /// `resultType: string`
    String(String),
}

impl QueryResult {
    /// The `resultType` name.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Vector(_) => "vector",
            Self::Matrix(_) => "matrix",
            Self::Scalar(_) => "scalar",
            Self::String(_) => "string",
        }
    }

    /// Single-value instant vector without labels; handy for fakes and tests.
    pub fn single(value: impl Into<String>) -> Self {
        Self::Vector(vec![InstantSample {
            labels: BTreeMap::new(),
            value: value.into(),
        }])
    }

    /// Single-series matrix without labels; handy for fakes and tests.
    pub fn series<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Matrix(vec![RangeSeries {
            labels: BTreeMap::new(),
            values: values.into_iter().map(Into::into).collect(),
        }])
    }
}

/// Parse a backend sample value. Accepts the `+Inf`/`-Inf`/`NaN` spellings.
pub fn parse_sample_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}
