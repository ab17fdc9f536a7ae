//! Poller orchestration.
//!
//! Owns the de-duplicated query set, fans baseline capture out across every
//! query, then runs one [`ConvergenceWatcher`] per baselined query under a
//! shared cancellation token until they all converge, one of them fails, the
//! deadline passes or the caller cancels.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::baseline_estimator::{BaselineEstimator, BaselineWindow};
use super::convergence_watcher::{ConvergenceWatcher, StatusNotifier, WatchSettings};
use crate::domain::errors::PollError;
use crate::domain::models::{BackendConfig, Baseline, BaselineFailurePolicy, PollConfig};
use crate::domain::ports::MetricsClient;
use crate::domain::query::{MatchKind, QueryExpression};
use crate::infrastructure::prometheus::PrometheusClient;

/// Counts of baseline outcomes after [`Poller::initialize_baselines`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaselineSummary {
    /// Queries with a usable band.
    pub established: usize,
    /// Queries whose history window was empty.
    pub no_history: usize,
    /// Queries whose estimate errored.
    pub failed: usize,
}

impl BaselineSummary {
    /// Number of queries accounted for.
    pub const fn total(&self) -> usize {
        self.established + self.no_history + self.failed
    }

    fn record(&mut self, baseline: &Baseline) {
        match baseline {
            Baseline::Established(_) => self.established += 1,
            Baseline::NoHistory => self.no_history += 1,
            Baseline::Failed { .. } => self.failed += 1,
        }
    }
}

impl fmt::Display for BaselineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} established, {} without history, {} failed",
            self.established, self.no_history, self.failed
        )
    }
}

/// Convergence poller over a fixed set of queries.
pub struct Poller {
    client: Arc<dyn MetricsClient>,
    queries: Vec<QueryExpression>,
    config: PollConfig,
    baselines: HashMap<String, Baseline>,
    notifier: Option<StatusNotifier>,
}

impl Poller {
    /// Parse and de-duplicate `queries`. Any query that fails to parse is a
    /// configuration error; nothing is sent to the backend here.
    pub fn new<I, S>(
        client: Arc<dyn MetricsClient>,
        queries: I,
        config: PollConfig,
    ) -> Result<Self, PollError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = queries
            .into_iter()
            .map(|text| {
                let text = text.as_ref();
                QueryExpression::parse(text).map_err(|source| PollError::InvalidQuery {
                    query: text.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            client,
            queries: dedup(parsed),
            config,
            baselines: HashMap::new(),
            notifier: None,
        })
    }

    /// Build a Prometheus client against one of `backend.addresses`, picked at
    /// random, and a poller on top of it.
    pub fn connect<I, S>(
        backend: &BackendConfig,
        queries: I,
        config: PollConfig,
    ) -> Result<Self, PollError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let client = PrometheusClient::connect(&backend.addresses, backend.request_timeout())?;
        info!(address = %client.base_url(), "selected metrics backend");
        Self::new(Arc::new(client), queries, config)
    }

    /// Receive a status line for every successful sample while waiting.
    #[must_use]
    pub fn with_notifier<F>(mut self, notifier: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    /// Inject a label matcher into every query.
    ///
    /// Queries that become identical collapse into one, and any captured
    /// baselines are discarded since their keys no longer match.
    pub fn add_label(&mut self, name: &str, value: &str, kind: MatchKind) -> Result<(), PollError> {
        for query in &mut self.queries {
            query
                .add_label(name, value, kind)
                .map_err(|source| PollError::InvalidQuery {
                    query: query.source().to_string(),
                    source,
                })?;
        }
        self.queries = dedup(std::mem::take(&mut self.queries));
        self.baselines.clear();
        Ok(())
    }

    /// De-duplicated queries, in input order.
    pub fn queries(&self) -> &[QueryExpression] {
        &self.queries
    }

    /// Settings this poller was built with.
    pub const fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Baseline recorded for the canonical form of a query, if any.
    pub fn baseline(&self, query: &str) -> Option<&Baseline> {
        self.baselines.get(query)
    }

    /// Capture a baseline for every query concurrently.
    ///
    /// Each estimate runs to completion regardless of the others. A failed
    /// estimate is recorded as [`Baseline::Failed`]; with
    /// [`BaselineFailurePolicy::Abort`] the first failure is then returned.
    #[instrument(skip_all, fields(queries = self.queries.len()))]
    pub async fn initialize_baselines(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<BaselineSummary, PollError> {
        let estimator = BaselineEstimator::new(
            Arc::clone(&self.client),
            BaselineWindow::from(&self.config),
        );
        let estimator = &estimator;
        let now = Utc::now();
        let keys: Vec<String> = self.queries.iter().map(ToString::to_string).collect();

        let estimates = join_all(keys.iter().map(|key| async move {
            (key, estimator.establish(key, now).await)
        }));

        let results = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(PollError::Cancelled {
                    activity: "initializing baselines".to_string(),
                })
            }
            results = estimates => results,
        };

        let mut summary = BaselineSummary::default();
        let mut first_error = None;
        for (key, result) in results {
            let baseline = match result {
                Ok(baseline) => baseline,
                Err(error) => {
                    warn!(query = %key, error = %error, "could not establish baseline");
                    let reason = error.to_string();
                    first_error.get_or_insert(error);
                    Baseline::Failed { reason }
                }
            };
            summary.record(&baseline);
            self.baselines.insert(key.clone(), baseline);
        }

        if self.config.baseline_failure == BaselineFailurePolicy::Abort {
            if let Some(error) = first_error {
                return Err(error);
            }
        }

        info!(
            established = summary.established,
            no_history = summary.no_history,
            failed = summary.failed,
            "baselines initialized"
        );
        Ok(summary)
    }

    /// Wait for every baselined query to converge.
    ///
    /// Returns as soon as the outcome is known: all watchers converged, one
    /// watcher failed, `timeout` elapsed or `cancel` fired. Remaining watchers
    /// are cancelled and aborted on return. With nothing to watch this still
    /// waits one `interval` before succeeding.
    #[instrument(skip_all, fields(interval = ?interval, timeout = ?timeout))]
    pub async fn wait(
        &self,
        interval: Duration,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), PollError> {
        let started = Instant::now();
        // A timeout too large to represent is no deadline at all.
        let deadline = started.checked_add(timeout);
        let watch_token = cancel.child_token();
        let _cancel_on_return = watch_token.clone().drop_guard();

        let settings = WatchSettings {
            interval,
            scrape_lag: self.config.scrape_lag(),
            required_successes: self.config.required_successes,
        };

        let mut watchers = JoinSet::new();
        for query in &self.queries {
            let key = query.to_string();
            let baseline = self
                .baselines
                .get(&key)
                .ok_or_else(|| PollError::LookupInvariant {
                    query: key.clone(),
                    what: "baseline",
                })?;
            let Some(band) = baseline.band() else {
                debug!(query = %key, baseline = %baseline, "not waiting on query");
                continue;
            };

            let watcher = ConvergenceWatcher::new(
                Arc::clone(&self.client),
                key,
                *band,
                settings,
                started,
            )
            .with_notifier(self.notifier.clone());
            watchers.spawn(watcher.run(watch_token.clone()));
        }

        let watching = watchers.len();
        if watching == 0 {
            info!("no queries with a baseline, waiting one interval");
            let idle = watch_token.clone();
            watchers.spawn(async move {
                tokio::select! {
                    () = idle.cancelled() => Err(PollError::Cancelled {
                        activity: "waiting with no queries to watch".to_string(),
                    }),
                    () = tokio::time::sleep(interval) => Ok(()),
                }
            });
        } else {
            info!(watching, "waiting for queries to converge");
        }

        let mut converged = 0_usize;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(PollError::Cancelled {
                        activity: "waiting for queries to converge".to_string(),
                    });
                }
                joined = watchers.join_next() => match joined {
                    None => {
                        info!(converged, elapsed = ?started.elapsed(), "polling complete");
                        return Ok(());
                    }
                    Some(Ok(Ok(()))) => {
                        converged += 1;
                        debug!(converged, watching, "watcher finished");
                    }
                    Some(Ok(Err(error))) => {
                        warn!(error = %error, "watcher failed, cancelling the rest");
                        return Err(error);
                    }
                    Some(Err(join_error)) => {
                        return Err(PollError::TaskFailed(join_error.to_string()));
                    }
                },
                () = until(deadline) => {
                    let elapsed = started.elapsed();
                    warn!(elapsed = ?elapsed, converged, watching, "deadline exceeded");
                    return Err(PollError::DeadlineExceeded { elapsed });
                }
            }
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Keep the first query of every canonical form, in input order.
fn dedup(queries: Vec<QueryExpression>) -> Vec<QueryExpression> {
    let mut seen = HashSet::new();
    queries
        .into_iter()
        .filter(|query| seen.insert(query.to_string()))
        .collect()
}
