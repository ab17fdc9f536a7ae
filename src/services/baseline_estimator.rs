//! Baseline capture.
//!
//! Reads a history window for a query and reduces it to a [`Band`]: the most
//! recent sample is the reference value and the population standard deviation
//! of the window is the tolerance. Noisy gauges therefore get a wide band and
//! flat ones a narrow one.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::domain::errors::PollError;
use crate::domain::models::{parse_sample_value, Band, Baseline, PollConfig, QueryResult};
use crate::domain::ports::{MetricsClient, QueryRange};

/// History window used to capture a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaselineWindow {
    /// Window length.
    pub lookback: Duration,
    /// Window resolution.
    pub step: Duration,
    /// Both window ends are moved this far into the past.
    pub scrape_lag: Duration,
}

impl Default for BaselineWindow {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for BaselineWindow {
    fn from(config: &PollConfig) -> Self {
        Self {
            lookback: config.lookback(),
            step: config.step(),
            scrape_lag: config.scrape_lag(),
        }
    }
}

impl BaselineWindow {
    /// The range to request for a baseline captured at `now`.
    pub fn range_ending_at(&self, now: DateTime<Utc>) -> QueryRange {
        let end = shift_back(now, self.scrape_lag);
        QueryRange {
            start: shift_back(end, self.lookback),
            end,
            step: self.step,
        }
    }
}

/// `at - by`, clamped to the earliest representable time.
pub(crate) fn shift_back(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|delta| at.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Captures baselines through a [`MetricsClient`].
pub struct BaselineEstimator {
    client: Arc<dyn MetricsClient>,
    window: BaselineWindow,
}

impl BaselineEstimator {
    /// Estimator reading `window` through `client`.
    pub fn new(client: Arc<dyn MetricsClient>, window: BaselineWindow) -> Self {
        Self { client, window }
    }

    /// Capture the baseline for `query` with the window ending at `now`.
    ///
    /// An empty window yields [`Baseline::NoHistory`]. More than one series,
    /// a non-matrix result or an unparseable sample is an error.
    #[instrument(skip_all, fields(query = %query))]
    pub async fn establish(&self, query: &str, now: DateTime<Utc>) -> Result<Baseline, PollError> {
        let range = self.window.range_ending_at(now);
        debug!(start = %range.start, end = %range.end, step = ?range.step, "querying baseline window");

        let result = self
            .client
            .range_query(query, range)
            .await
            .map_err(|source| PollError::Backend {
                query: query.to_string(),
                source,
            })?;

        let Some(raw) = single_range_series(query, result)? else {
            info!("no initial values found, will skip while waiting");
            return Ok(Baseline::NoHistory);
        };

        let values = raw
            .iter()
            .map(|v| {
                parse_sample_value(v).ok_or_else(|| PollError::InvalidSample {
                    query: query.to_string(),
                    value: v.clone(),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let Some(band) = summarize(&values) else {
            info!("history window had no samples, will skip while waiting");
            return Ok(Baseline::NoHistory);
        };

        info!(
            reference = band.reference(),
            tolerance = band.tolerance(),
            samples = values.len(),
            "initial values captured"
        );
        Ok(Baseline::Established(band))
    }
}

/// Enforce the range contract: zero series means no history, one series is
/// the answer, anything else is a protocol violation.
fn single_range_series(query: &str, result: QueryResult) -> Result<Option<Vec<String>>, PollError> {
    match result {
        QueryResult::Matrix(mut series) => match series.len() {
            0 => Ok(None),
            1 => Ok(series.pop().map(|s| s.values)),
            n => Err(PollError::ProtocolViolation {
                query: query.to_string(),
                detail: format!("queries must return exactly one metric, got {n} series"),
            }),
        },
        other => Err(PollError::ProtocolViolation {
            query: query.to_string(),
            detail: format!("expected a matrix from a range query, got {}", other.kind()),
        }),
    }
}

/// Reference (latest sample) and tolerance (population standard deviation).
/// `None` for an empty slice.
pub fn summarize(values: &[f64]) -> Option<Band> {
    let reference = *values.last()?;
    Some(Band::new(reference, population_std_dev(values)))
}

/// `sqrt(mean(x^2) - mean(x)^2)`, with a not-a-number result (cancellation
/// pushing the radicand below zero, or non-finite input) reported as `0`.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let (sum, squared_sum) = values
        .iter()
        .fold((0.0_f64, 0.0_f64), |(sum, sq), v| (sum + v, sq + v * v));
    #[allow(clippy::cast_precision_loss)]
    let count = values.len() as f64;
    let mean = sum / count;

    let std_dev = (squared_sum / count - mean * mean).sqrt();
    if std_dev.is_nan() {
        0.0
    } else {
        std_dev
    }
}
