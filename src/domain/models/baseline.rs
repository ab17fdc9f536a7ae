//! Per-query baseline records and the convergence streak counter.

use std::fmt;

/// Reference value and the absolute deviation accepted around it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    reference: f64,
    tolerance: f64,
}

impl Band {
    /// A tolerance that is negative or not a number is clamped to `0`.
    pub fn new(reference: f64, tolerance: f64) -> Self {
        let tolerance = if tolerance.is_nan() || tolerance < 0.0 {
            0.0
        } else {
            tolerance
        };
        Self {
            reference,
            tolerance,
        }
    }

    /// Latest value of the history window.
    pub const fn reference(&self) -> f64 {
        self.reference
    }

    /// Largest accepted distance from the reference.
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Distance of `value` from the reference.
    pub fn deviation(&self, value: f64) -> f64 {
        (value - self.reference).abs()
    }

    /// `|value - reference| <= tolerance`. A `NaN` value is never inside.
    pub fn contains(&self, value: f64) -> bool {
        self.deviation(value) <= self.tolerance
    }
}

/// Outcome of baseline capture for one query. Built once during
/// initialization and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Baseline {
    /// History was found; the query is watched against this band.
    Established(Band),
    /// The history window was empty; the query is not waited on.
    NoHistory,
    /// Capture failed and the failure policy chose to exclude the query.
    Failed {
        /// Rendered error.
        reason: String,
    },
}

impl Baseline {
    /// The band to watch against; only established baselines have one.
    pub const fn band(&self) -> Option<&Band> {
        match self {
            Self::Established(band) => Some(band),
            Self::NoHistory | Self::Failed { .. } => None,
        }
    }
}

impl fmt::Display for Baseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Established(band) => write!(
                f,
                "initial value {:.4}, stddev {:.4}",
                band.reference, band.tolerance
            ),
            Self::NoHistory => f.write_str("no history"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// What a single observation did to the streak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// The streak passed the required count; the watcher is done.
    Converged,
    /// In tolerance, but more consecutive samples are needed.
    Within {
        /// Consecutive in-tolerance samples so far.
        streak: u32,
    },
    /// Out of tolerance; the streak was reset.
    Outside {
        /// Distance of the sample from the reference.
        deviation: f64,
    },
    /// The sample could not be taken; the streak was reset.
    Failed,
}

/// Consecutive in-tolerance counter for one watcher.
#[derive(Debug, Clone)]
pub struct ConvergenceState {
    required_successes: u32,
    consecutive: u32,
}

impl ConvergenceState {
    /// `required_successes == 0` converges on the first in-tolerance sample.
    pub const fn new(required_successes: u32) -> Self {
        Self {
            required_successes,
            consecutive: 0,
        }
    }

    /// Current streak length.
    pub const fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Record a sampled value against `band`.
    pub fn observe(&mut self, band: &Band, value: f64) -> Verdict {
        if band.contains(value) {
            self.consecutive = self.consecutive.saturating_add(1);
            if self.consecutive > self.required_successes {
                Verdict::Converged
            } else {
                Verdict::Within {
                    streak: self.consecutive,
                }
            }
        } else {
            self.consecutive = 0;
            Verdict::Outside {
                deviation: band.deviation(value),
            }
        }
    }

    /// Record a sample that could not be taken.
    pub fn observe_error(&mut self) -> Verdict {
        self.consecutive = 0;
        Verdict::Failed
    }
}
