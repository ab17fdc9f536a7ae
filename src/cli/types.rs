//! CLI type definitions
//!
//! Clap structures for `promquery-poll`. Every flag that has a config
//! counterpart is optional here and only overrides the loaded value when set.

use std::path::PathBuf;

use clap::Parser;

use crate::domain::models::{BaselineFailurePolicy, Config, LogFormat};
use crate::domain::query::MatchKind;

/// Command-line arguments of `promquery-poll`.
#[derive(Parser, Debug)]
#[command(name = "promquery-poll")]
#[command(
    about = "Capture a Prometheus baseline and wait until every query returns to it",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Prometheus base URL; repeat to give candidates, one is picked at random
    #[arg(short = 'a', long = "addr", value_name = "URL")]
    pub addresses: Vec<String>,

    /// Query to watch; repeat for several. Each must resolve to one series
    #[arg(short = 'q', long = "query", value_name = "PROMQL", required = true)]
    pub queries: Vec<String>,

    /// Matcher injected into every query: name=value, name!=value, name=~re or name!~re
    #[arg(short = 'l', long = "label", value_name = "MATCHER", value_parser = parse_label)]
    pub labels: Vec<LabelArg>,

    /// Seconds between samples of the same query
    #[arg(short = 'i', long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Overall deadline in seconds
    #[arg(short = 't', long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// In-tolerance samples required beyond the first (0 converges on the first)
    #[arg(short = 'n', long = "success-count", value_name = "COUNT")]
    pub success_count: Option<u32>,

    /// What to do when a baseline cannot be captured: exclude or abort
    #[arg(long, value_name = "POLICY")]
    pub baseline_failure: Option<BaselineFailurePolicy>,

    /// Config file (defaults to ./promquery.yaml when present)
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log format: pretty or json
    #[arg(long, value_name = "FORMAT", value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Apply flags on top of the file/environment configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if !self.addresses.is_empty() {
            config.backend.addresses.clone_from(&self.addresses);
        }
        if let Some(interval) = self.interval {
            config.poll.interval_secs = interval;
        }
        if let Some(timeout) = self.timeout {
            config.poll.timeout_secs = timeout;
        }
        if let Some(count) = self.success_count {
            config.poll.required_successes = count;
        }
        if let Some(policy) = self.baseline_failure {
            config.poll.baseline_failure = policy;
        }
        if let Some(ref level) = self.log_level {
            config.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

/// A `--label` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelArg {
    /// Label name.
    pub name: String,
    /// Value or pattern.
    pub value: String,
    /// Operator.
    pub kind: MatchKind,
}

/// Parse `name=value`, `name!=value`, `name=~re` or `name!~re`.
pub fn parse_label(raw: &str) -> Result<LabelArg, String> {
    let usage = || format!("expected name=value, name!=value, name=~re or name!~re, got {raw:?}");

    let split = raw.find(|c: char| c == '=' || c == '!').ok_or_else(usage)?;
    let (name, rest) = raw.split_at(split);

    let (kind, value) = if let Some(value) = rest.strip_prefix("=~") {
        (MatchKind::RegexMatch, value)
    } else if let Some(value) = rest.strip_prefix("!~") {
        (MatchKind::RegexNotMatch, value)
    } else if let Some(value) = rest.strip_prefix("!=") {
        (MatchKind::NotEqual, value)
    } else if let Some(value) = rest.strip_prefix('=') {
        (MatchKind::Equal, value)
    } else {
        return Err(usage());
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(usage());
    }

    Ok(LabelArg {
        name: name.to_string(),
        value: value.to_string(),
        kind,
    })
}

/// Parse `pretty` or `json`.
pub fn parse_log_format(raw: &str) -> Result<LogFormat, String> {
    match raw.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_kinds() {
        let cases = [
            ("az=us-east-1", MatchKind::Equal, "us-east-1"),
            ("az!=us-east-1", MatchKind::NotEqual, "us-east-1"),
            ("az=~us-.*", MatchKind::RegexMatch, "us-.*"),
            ("az!~eu-.*", MatchKind::RegexNotMatch, "eu-.*"),
        ];
        for (raw, kind, value) in cases {
            let label = parse_label(raw).unwrap();
            assert_eq!(label.name, "az", "{raw}");
            assert_eq!(label.kind, kind, "{raw}");
            assert_eq!(label.value, value, "{raw}");
        }
    }

    #[test]
    fn test_parse_label_value_may_contain_operators() {
        let label = parse_label("path=/a=b").unwrap();
        assert_eq!(label.kind, MatchKind::Equal);
        assert_eq!(label.value, "/a=b");
    }

    #[test]
    fn test_parse_label_rejects_malformed() {
        assert!(parse_label("az").is_err());
        assert!(parse_label("=value").is_err());
        assert!(parse_label("az!value").is_err());
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!(parse_log_format("JSON").unwrap(), LogFormat::Json);
        assert!(parse_log_format("xml").is_err());
    }
}
