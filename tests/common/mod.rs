//! Common test utilities for integration tests
//!
//! Provides a scripted in-memory [`MetricsClient`] plus logging setup shared
//! by the poller tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use promquery::domain::models::{InstantSample, QueryResult, RangeSeries};
use promquery::domain::ports::{MetricsClient, MetricsError, QueryRange};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// One scripted backend answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Result(QueryResult),
    Unavailable,
    Timeout,
}

impl Reply {
    /// Single-series instant vector holding `value`.
    pub fn value(value: &str) -> Self {
        Self::Result(QueryResult::single(value))
    }

    /// Instant vector with `count` identical series.
    pub fn series_count(count: usize) -> Self {
        let sample = InstantSample {
            labels: Default::default(),
            value: "1".to_string(),
        };
        Self::Result(QueryResult::Vector(vec![sample; count]))
    }

    fn into_result(self) -> Result<QueryResult, MetricsError> {
        match self {
            Self::Result(result) => Ok(result),
            Self::Unavailable => Err(MetricsError::Unavailable("scripted outage".to_string())),
            Self::Timeout => Err(MetricsError::Timeout),
        }
    }
}

#[derive(Default)]
struct Script {
    range: HashMap<String, Reply>,
    instant: HashMap<String, VecDeque<Reply>>,
    range_calls: HashMap<String, usize>,
    instant_calls: HashMap<String, usize>,
}

/// In-memory backend keyed by canonical query string.
///
/// Range queries return the configured history, or an empty matrix when none
/// was configured. Instant queries pop scripted replies in order and keep
/// repeating the last one; an unscripted query is unavailable.
#[derive(Default)]
pub struct FakeMetricsClient {
    script: Mutex<Script>,
}

impl FakeMetricsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// History window for `query`, oldest sample first.
    pub fn with_history(self, query: &str, values: &[&str]) -> Self {
        self.with_range_reply(query, Reply::Result(QueryResult::series(values.iter().copied())))
    }

    pub fn with_range_reply(self, query: &str, reply: Reply) -> Self {
        self.lock().range.insert(query.to_string(), reply);
        self
    }

    /// Range result with `count` identical series.
    pub fn with_ambiguous_history(self, query: &str, count: usize) -> Self {
        let series = RangeSeries {
            labels: Default::default(),
            values: vec!["1".to_string()],
        };
        self.with_range_reply(
            query,
            Reply::Result(QueryResult::Matrix(vec![series; count])),
        )
    }

    /// Instant replies for `query`, returned in order.
    pub fn with_samples<I>(self, query: &str, replies: I) -> Self
    where
        I: IntoIterator<Item = Reply>,
    {
        self.lock()
            .instant
            .insert(query.to_string(), replies.into_iter().collect());
        self
    }

    /// Instant values for `query`, returned in order.
    pub fn with_values(self, query: &str, values: &[&str]) -> Self {
        self.with_samples(query, values.iter().map(|v| Reply::value(v)))
    }

    pub fn range_calls(&self, query: &str) -> usize {
        self.lock().range_calls.get(query).copied().unwrap_or(0)
    }

    pub fn instant_calls(&self, query: &str) -> usize {
        self.lock().instant_calls.get(query).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script lock poisoned")
    }
}

#[async_trait]
impl MetricsClient for FakeMetricsClient {
    async fn instant_query(
        &self,
        query: &str,
        _at: DateTime<Utc>,
    ) -> Result<QueryResult, MetricsError> {
        let mut script = self.lock();
        *script.instant_calls.entry(query.to_string()).or_default() += 1;

        let reply = match script.instant.get_mut(query) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        reply.unwrap_or(Reply::Unavailable).into_result()
    }

    async fn range_query(
        &self,
        query: &str,
        _range: QueryRange,
    ) -> Result<QueryResult, MetricsError> {
        let mut script = self.lock();
        *script.range_calls.entry(query.to_string()).or_default() += 1;

        script
            .range
            .get(query)
            .cloned()
            .unwrap_or(Reply::Result(QueryResult::Matrix(vec![])))
            .into_result()
    }
}
