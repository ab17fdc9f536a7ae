//! Label matchers: the `name op "value"` constraints inside a selector.

use promql_parser::label::{MatchOp, Matcher};
use regex::Regex;

use crate::domain::errors::QueryError;

/// Reserved label carrying the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// How a label matcher compares a label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// `name="value"`
    Equal,
    /// `name!="value"`
    NotEqual,
    /// `name=~"regex"`
    RegexMatch,
    /// `name!~"regex"`
    RegexNotMatch,
}

impl MatchKind {
    /// Operator as written in a selector.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::RegexMatch => "=~",
            Self::RegexNotMatch => "!~",
        }
    }

    pub(crate) fn of(op: &MatchOp) -> Self {
        match op {
            MatchOp::Equal => Self::Equal,
            MatchOp::NotEqual => Self::NotEqual,
            MatchOp::Re(_) => Self::RegexMatch,
            MatchOp::NotRe(_) => Self::RegexNotMatch,
        }
    }
}

/// Read-only view of one matcher in a parsed selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMatcher {
    /// Label name.
    pub name: String,
    /// Comparison operator.
    pub kind: MatchKind,
    /// Literal value, or the unanchored pattern for regex kinds.
    pub value: String,
}

impl From<&Matcher> for LabelMatcher {
    fn from(matcher: &Matcher) -> Self {
        Self {
            name: matcher.name.clone(),
            kind: MatchKind::of(&matcher.op),
            value: matcher.value.clone(),
        }
    }
}

/// Build a parser-level matcher, compiling regex values fully anchored.
pub(crate) fn build(kind: MatchKind, name: &str, value: &str) -> Result<Matcher, QueryError> {
    if !is_valid_label_name(name) {
        return Err(QueryError::InvalidLabelName(name.to_string()));
    }

    let op = match kind {
        MatchKind::Equal => MatchOp::Equal,
        MatchKind::NotEqual => MatchOp::NotEqual,
        MatchKind::RegexMatch => MatchOp::Re(anchored(value)?),
        MatchKind::RegexNotMatch => MatchOp::NotRe(anchored(value)?),
    };

    Ok(Matcher {
        op,
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Same label, operator and value.
pub(crate) fn same(a: &Matcher, b: &Matcher) -> bool {
    a.name == b.name && a.value == b.value && MatchKind::of(&a.op) == MatchKind::of(&b.op)
}

fn anchored(pattern: &str) -> Result<Regex, QueryError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| QueryError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
