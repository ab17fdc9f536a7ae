//! Per-query convergence watcher.
//!
//! A watcher sleeps one interval, takes one instant sample, scores it against
//! the baseline band and repeats until the streak of in-tolerance samples
//! passes the required count. Failed samples reset the streak and are retried
//! on the next interval; only cancellation ends the loop early.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::baseline_estimator::shift_back;
use crate::domain::errors::PollError;
use crate::domain::models::{parse_sample_value, Band, ConvergenceState, QueryResult, Verdict};
use crate::domain::ports::MetricsClient;

/// Receives a human-readable status line for every successful sample.
pub type StatusNotifier = Arc<dyn Fn(&str) + Send + Sync>;

/// Timing and threshold settings shared by every watcher of a run.
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    /// Pause before every sample.
    pub interval: Duration,
    /// How far in the past each sample is evaluated.
    pub scrape_lag: Duration,
    /// In-tolerance samples needed beyond the first.
    pub required_successes: u32,
}

/// Polls one query until it is back inside its band.
pub struct ConvergenceWatcher {
    client: Arc<dyn MetricsClient>,
    query: String,
    band: Band,
    settings: WatchSettings,
    state: ConvergenceState,
    started: Instant,
    notifier: Option<StatusNotifier>,
}

impl ConvergenceWatcher {
    /// `started` is the instant the overall wait began; it only feeds the
    /// elapsed time shown in status lines.
    pub fn new(
        client: Arc<dyn MetricsClient>,
        query: impl Into<String>,
        band: Band,
        settings: WatchSettings,
        started: Instant,
    ) -> Self {
        Self {
            client,
            query: query.into(),
            band,
            settings,
            state: ConvergenceState::new(settings.required_successes),
            started,
            notifier: None,
        }
    }

    /// Send a status line for every successful sample.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Option<StatusNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Poll until converged or `cancel` fires.
    #[instrument(skip_all, fields(query = %self.query))]
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), PollError> {
        loop {
            debug!(
                interval = ?self.settings.interval,
                elapsed = ?self.started.elapsed(),
                "waiting to poll for metrics"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.aborted()),
                () = tokio::time::sleep(self.settings.interval) => {}
            }

            let sample = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.aborted()),
                sample = self.sample() => sample,
            };

            let verdict = match sample {
                Ok(value) => {
                    self.notify(value);
                    self.state.observe(&self.band, value)
                }
                Err(error) => {
                    let transient = matches!(
                        &error,
                        PollError::Backend { source, .. } if source.is_transient()
                    );
                    warn!(
                        error = %error,
                        class = ?error.class(),
                        transient,
                        "error while polling, retrying next interval"
                    );
                    self.state.observe_error()
                }
            };

            match verdict {
                Verdict::Converged => {
                    info!(
                        reference = self.band.reference(),
                        tolerance = self.band.tolerance(),
                        elapsed = ?self.started.elapsed(),
                        "query converged"
                    );
                    return Ok(());
                }
                Verdict::Within { streak } => {
                    debug!(
                        streak,
                        required = self.settings.required_successes,
                        "sample within tolerance"
                    );
                }
                Verdict::Outside { deviation } => {
                    debug!(
                        deviation,
                        tolerance = self.band.tolerance(),
                        "sample outside tolerance"
                    );
                }
                Verdict::Failed => {}
            }
        }
    }

    /// Take one instant sample, evaluated `scrape_lag` in the past.
    async fn sample(&self) -> Result<f64, PollError> {
        let at = shift_back(Utc::now(), self.settings.scrape_lag);
        let result = self
            .client
            .instant_query(&self.query, at)
            .await
            .map_err(|source| PollError::Backend {
                query: self.query.clone(),
                source,
            })?;
        single_instant_value(&self.query, result)
    }

    fn notify(&self, current: f64) {
        let line = format!(
            "initial value {}, current value {} ({:.1?} elapsed)",
            self.band.reference(),
            current,
            self.started.elapsed()
        );
        info!(
            reference = self.band.reference(),
            current,
            deviation = self.band.deviation(current),
            "sampled"
        );
        if let Some(notifier) = &self.notifier {
            notifier(&line);
        }
    }

    fn aborted(&self) -> PollError {
        PollError::Cancelled {
            activity: format!("watching {}", self.query),
        }
    }
}

/// Enforce the instant contract: exactly one series in a vector result.
fn single_instant_value(query: &str, result: QueryResult) -> Result<f64, PollError> {
    let raw = match result {
        QueryResult::Vector(mut samples) if samples.len() == 1 => {
            samples.pop().map(|s| s.value).unwrap_or_default()
        }
        QueryResult::Vector(samples) => {
            return Err(PollError::ProtocolViolation {
                query: query.to_string(),
                detail: format!(
                    "queries must return exactly one metric, got {} series",
                    samples.len()
                ),
            })
        }
        other => {
            return Err(PollError::ProtocolViolation {
                query: query.to_string(),
                detail: format!("expected a vector from an instant query, got {}", other.kind()),
            })
        }
    };

    parse_sample_value(&raw).ok_or_else(|| PollError::InvalidSample {
        query: query.to_string(),
        value: raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorClass;
    use crate::domain::models::InstantSample;

    #[test]
    fn test_single_instant_value() {
        assert_eq!(single_instant_value("up", QueryResult::single("2.5")).unwrap(), 2.5);
    }

    #[test]
    fn test_empty_vector_is_sample_error() {
        let err = single_instant_value("up", QueryResult::Vector(vec![])).unwrap_err();
        assert_eq!(err.class(), ErrorClass::ProtocolViolation);
        assert!(err.to_string().contains("got 0 series"));
    }

    #[test]
    fn test_multiple_series_is_sample_error() {
        let sample = InstantSample {
            labels: std::collections::BTreeMap::new(),
            value: "1".to_string(),
        };
        let err = single_instant_value("up", QueryResult::Vector(vec![sample.clone(), sample]))
            .unwrap_err();
        assert!(matches!(err, PollError::ProtocolViolation { .. }));
    }

    #[test]
    fn test_unexpected_type_is_sample_error() {
        let err = single_instant_value("up", QueryResult::Scalar("1".to_string())).unwrap_err();
        assert_eq!(err.class(), ErrorClass::ProtocolViolation);
    }

    #[test]
    fn test_unparseable_value_is_sample_error() {
        let err = single_instant_value("up", QueryResult::single("many")).unwrap_err();
        assert!(matches!(err, PollError::InvalidSample { .. }));
        assert_eq!(err.class(), ErrorClass::Backend);
    }
}
