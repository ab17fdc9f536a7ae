//! Service layer: baseline capture, per-query watching and orchestration.

pub mod baseline_estimator;
pub mod convergence_watcher;
pub mod poller;

pub use baseline_estimator::{BaselineEstimator, BaselineWindow};
pub use convergence_watcher::{ConvergenceWatcher, StatusNotifier, WatchSettings};
pub use poller::{BaselineSummary, Poller};
