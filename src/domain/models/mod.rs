//! Domain models: baselines, result shapes and configuration.

pub mod baseline;
pub mod config;
pub mod sample;

pub use baseline::{Band, Baseline, ConvergenceState, Verdict};
pub use config::{
    BackendConfig, BaselineFailurePolicy, Config, LogFormat, LoggingConfig, PollConfig,
    RotationPolicy,
};
pub use sample::{parse_sample_value, InstantSample, QueryResult, RangeSeries};
