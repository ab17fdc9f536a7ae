//! Domain error types
//!
//! `PollError` is the single terminal error the poller reports. Its variants
//! separate configuration problems, backend failures, contract violations,
//! internal invariant breaks and cancellation so callers can tell "still
//! unresolved" apart from "errored".

use std::time::Duration;

use thiserror::Error;

use crate::domain::ports::MetricsError;

/// Errors raised while parsing or rewriting a query expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The text is not valid PromQL.
    #[error("parse error: {0}")]
    Parse(String),

    /// The text nests or chains deeper than the parser is allowed to go.
    #[error("query is too complex: more than {limit} {what}")]
    TooComplex {
        /// Which limit was hit.
        what: &'static str,
        /// The limit itself.
        limit: usize,
    },

    /// A regex matcher value does not compile.
    #[error("invalid regex {pattern:?}: {reason}")]
    InvalidRegex {
        /// Pattern as given, before anchoring.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// A label name outside `[a-zA-Z_][a-zA-Z0-9_]*`.
    #[error("invalid label name: {0:?}")]
    InvalidLabelName(String),
}

/// Broad classification of a [`PollError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input detected before polling starts.
    Configuration,
    /// The backend failed or returned an unreadable sample.
    Backend,
    /// The backend answered with the wrong result shape.
    ProtocolViolation,
    /// Internal bookkeeping was inconsistent.
    LookupInvariant,
    /// Cancelled by the caller or by the deadline.
    Cancellation,
}

/// Errors surfaced by the baseline estimator, the watchers and the poller.
#[derive(Error, Debug)]
pub enum PollError {
    /// A query failed to parse or a label could not be injected.
    #[error("invalid query {query:?}: {source}")]
    InvalidQuery {
        /// Query text as supplied.
        query: String,
        /// Why it was rejected.
        #[source]
        source: QueryError,
    },

    /// Construction-time problem (no backend address, bad URL, client build failure).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backend call itself failed.
    #[error("backend query failed for {query}: {source}")]
    Backend {
        /// Canonical query.
        query: String,
        /// Failure reported by the client.
        #[source]
        source: MetricsError,
    },

    /// The backend answered with a shape the single-series contract forbids.
    #[error("unexpected result for {query}: {detail}")]
    ProtocolViolation {
        /// Canonical query.
        query: String,
        /// What was returned instead.
        detail: String,
    },

    /// A returned sample could not be read as a number.
    #[error("invalid sample value {value:?} for {query}")]
    InvalidSample {
        /// Canonical query.
        query: String,
        /// Raw sample text.
        value: String,
    },

    /// A per-query record that must exist was missing.
    #[error("missing {what} for query({query})")]
    LookupInvariant {
        /// Canonical query.
        query: String,
        /// Kind of record that was missing.
        what: &'static str,
    },

    /// The shared cancellation token fired (caller abort or a sibling failure).
    #[error("context was cancelled while {activity}")]
    Cancelled {
        /// What was in progress.
        activity: String,
    },

    /// The caller-supplied deadline elapsed first.
    #[error("deadline exceeded after {elapsed:?} before polling was complete")]
    DeadlineExceeded {
        /// Time spent waiting.
        elapsed: Duration,
    },

    /// A watcher task panicked or was aborted by the runtime.
    #[error("watcher task failed: {0}")]
    TaskFailed(String),
}

impl PollError {
    /// Broad category, used for exit codes and log fields.
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidQuery { .. } | Self::Configuration(_) => ErrorClass::Configuration,
            Self::Backend { .. } | Self::InvalidSample { .. } => ErrorClass::Backend,
            Self::ProtocolViolation { .. } => ErrorClass::ProtocolViolation,
            Self::LookupInvariant { .. } | Self::TaskFailed(_) => ErrorClass::LookupInvariant,
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => ErrorClass::Cancellation,
        }
    }

    /// True for cancellation and deadline errors.
    pub const fn is_cancellation(&self) -> bool {
        matches!(self.class(), ErrorClass::Cancellation)
    }
}
