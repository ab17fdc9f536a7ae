//! Query expressions
//!
//! Parsing and printing are done by `promql-parser`. This module injects
//! extra label matchers into every leaf selector of the parsed tree and
//! normalizes matcher order so that the printed form can serve as a query's
//! identity.

mod limits;
pub mod matcher;

use std::fmt;
use std::str::FromStr;

use promql_parser::label::Matcher;
use promql_parser::parser::{self, Expr, VectorSelector};

pub use limits::{MAX_NESTING, MAX_OPERATORS};
pub use matcher::{LabelMatcher, MatchKind, METRIC_NAME_LABEL};

use crate::domain::errors::QueryError;

/// A leaf selector as seen from outside: the metric name and its label
/// matchers, without the implicit `__name__` matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Metric name, when the selector names one.
    pub name: Option<String>,
    /// Label matchers in canonical order.
    pub matchers: Vec<LabelMatcher>,
}

impl From<&VectorSelector> for Selector {
    fn from(selector: &VectorSelector) -> Self {
        let name = selector.name.clone();
        let matchers = selector
            .matchers
            .matchers
            .iter()
            .chain(selector.matchers.or_matchers.iter().flatten())
            .filter(|m| !(m.name == METRIC_NAME_LABEL && name.as_deref() == Some(m.value.as_str())))
            .map(LabelMatcher::from)
            .collect();
        Self { name, matchers }
    }
}

/// A parsed query. The canonical string form (`to_string()`) is the identity
/// used for de-duplication and for every per-query lookup.
#[derive(Debug, Clone)]
pub struct QueryExpression {
    source: String,
    expr: Expr,
}

impl QueryExpression {
    /// Parse query text. Malformed input fails here, before any network activity.
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        limits::check(text)?;
        let mut expr = parser::parse(text).map_err(QueryError::Parse)?;
        for_each_selector_mut(&mut expr, normalize);
        Ok(Self {
            source: text.to_string(),
            expr,
        })
    }

    /// The text this expression was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Inject `name <kind> value` into every vector and range selector.
    ///
    /// Injecting a matcher that a selector already carries is a no-op for
    /// that selector. On error the expression is left unchanged.
    pub fn add_label(&mut self, name: &str, value: &str, kind: MatchKind) -> Result<(), QueryError> {
        let matcher = matcher::build(kind, name, value)?;
        for_each_selector_mut(&mut self.expr, |selector| {
            let matchers = &mut selector.matchers;
            if matchers.or_matchers.is_empty() {
                insert_matcher(&mut matchers.matchers, &matcher);
            } else {
                for group in &mut matchers.or_matchers {
                    insert_matcher(group, &matcher);
                }
            }
        });
        Ok(())
    }

    /// `name="value"` when `equal`, otherwise `name!="value"`.
    pub fn add_equal_label(&mut self, name: &str, value: &str, equal: bool) -> Result<(), QueryError> {
        let kind = if equal {
            MatchKind::Equal
        } else {
            MatchKind::NotEqual
        };
        self.add_label(name, value, kind)
    }

    /// `name=~"value"` when `equal`, otherwise `name!~"value"`.
    pub fn add_regex_label(&mut self, name: &str, value: &str, equal: bool) -> Result<(), QueryError> {
        let kind = if equal {
            MatchKind::RegexMatch
        } else {
            MatchKind::RegexNotMatch
        };
        self.add_label(name, value, kind)
    }

    /// Leaf selectors in the order they appear in the query.
    pub fn selectors(&self) -> Vec<Selector> {
        let mut out = Vec::new();
        for_each_selector(&self.expr, |selector| out.push(Selector::from(selector)));
        out
    }
}

/// Canonical selector shape: the metric name lives outside the braces and the
/// remaining matchers are sorted.
fn normalize(selector: &mut VectorSelector) {
    let matchers = &mut selector.matchers.matchers;
    let is_name = |m: &Matcher| m.name == METRIC_NAME_LABEL && MatchKind::of(&m.op) == MatchKind::Equal;

    if let Some(name) = selector.name.clone() {
        matchers.retain(|m| !(is_name(m) && m.value == name));
    } else {
        let named: Vec<usize> = (0..matchers.len()).filter(|&i| is_name(&matchers[i])).collect();
        if let [index] = named[..] {
            if is_valid_metric_name(&matchers[index].value) {
                selector.name = Some(matchers.remove(index).value);
            }
        }
    }

    matchers.sort_by_cached_key(ToString::to_string);
    for group in &mut selector.matchers.or_matchers {
        group.sort_by_cached_key(ToString::to_string);
    }
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn insert_matcher(matchers: &mut Vec<Matcher>, matcher: &Matcher) {
    if matchers.iter().any(|m| matcher::same(m, matcher)) {
        return;
    }
    matchers.push(matcher.clone());
    matchers.sort_by_cached_key(ToString::to_string);
}

/// Visit every vector selector, including those inside range selectors, in
/// source order. Iterative so tree depth never turns into stack depth.
fn for_each_selector<'a>(expr: &'a Expr, mut visit: impl FnMut(&'a VectorSelector)) {
    let mut pending = vec![expr];
    while let Some(node) = pending.pop() {
        match node {
            Expr::VectorSelector(selector) => visit(selector),
            Expr::MatrixSelector(matrix) => visit(&matrix.vs),
            Expr::Aggregate(aggregate) => {
                pending.push(aggregate.expr.as_ref());
                if let Some(param) = &aggregate.param {
                    pending.push(param.as_ref());
                }
            }
            Expr::Binary(binary) => {
                pending.push(binary.rhs.as_ref());
                pending.push(binary.lhs.as_ref());
            }
            Expr::Unary(unary) => pending.push(unary.expr.as_ref()),
            Expr::Paren(paren) => pending.push(paren.expr.as_ref()),
            Expr::Subquery(subquery) => pending.push(subquery.expr.as_ref()),
            Expr::Call(call) => pending.extend(call.args.args.iter().rev().map(|arg| &**arg)),
            _ => {}
        }
    }
}

fn for_each_selector_mut(expr: &mut Expr, mut visit: impl FnMut(&mut VectorSelector)) {
    let mut pending = vec![expr];
    while let Some(node) = pending.pop() {
        match node {
            Expr::VectorSelector(selector) => visit(selector),
            Expr::MatrixSelector(matrix) => visit(&mut matrix.vs),
            Expr::Aggregate(aggregate) => {
                pending.push(aggregate.expr.as_mut());
                if let Some(param) = &mut aggregate.param {
                    pending.push(param.as_mut());
                }
            }
            Expr::Binary(binary) => {
                pending.push(binary.rhs.as_mut());
                pending.push(binary.lhs.as_mut());
            }
            Expr::Unary(unary) => pending.push(unary.expr.as_mut()),
            Expr::Paren(paren) => pending.push(paren.expr.as_mut()),
            Expr::Subquery(subquery) => pending.push(subquery.expr.as_mut()),
            Expr::Call(call) => pending.extend(call.args.args.iter_mut().map(|arg| &mut **arg)),
            _ => {}
        }
    }
}

impl fmt::Display for QueryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.expr, f)
    }
}

impl PartialEq for QueryExpression {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl FromStr for QueryExpression {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BINARY: &str = r#"foo_metric{role="bar"} - qux_metric{role!="baz"}"#;

    fn matcher_counts(q: &QueryExpression) -> Vec<usize> {
        q.selectors().iter().map(|s| s.matchers.len()).collect()
    }

    #[test]
    fn test_selectors_found_in_nested_expression() {
        let q = QueryExpression::parse(
            r#"sum(foo_metric{role="bar"}) - sum(qux_metric{role!="baz"} - up) - 3"#,
        )
        .unwrap();

        let selectors = q.selectors();
        assert_eq!(selectors.len(), 3);

        assert_eq!(selectors[0].name.as_deref(), Some("foo_metric"));
        assert_eq!(selectors[0].matchers[0].name, "role");
        assert_eq!(selectors[0].matchers[0].kind, MatchKind::Equal);
        assert_eq!(selectors[0].matchers[0].value, "bar");

        assert_eq!(selectors[1].name.as_deref(), Some("qux_metric"));
        assert_eq!(selectors[1].matchers[0].kind, MatchKind::NotEqual);
        assert_eq!(selectors[1].matchers[0].value, "baz");

        assert_eq!(selectors[2].name.as_deref(), Some("up"));
        assert!(selectors[2].matchers.is_empty());
    }

    #[test]
    fn test_add_equal_label() {
        let mut q = QueryExpression::parse(BINARY).unwrap();
        q.add_equal_label("az", "us-east-1", true).unwrap();

        assert_eq!(matcher_counts(&q), vec![2, 2]);
        assert_eq!(
            q.to_string(),
            r#"foo_metric{az="us-east-1",role="bar"} - qux_metric{az="us-east-1",role!="baz"}"#
        );
    }

    #[test]
    fn test_add_not_equal_label() {
        let mut q = QueryExpression::parse(BINARY).unwrap();
        q.add_equal_label("az", "us-east-1", false).unwrap();

        assert_eq!(
            q.to_string(),
            r#"foo_metric{az!="us-east-1",role="bar"} - qux_metric{az!="us-east-1",role!="baz"}"#
        );
    }

    #[test]
    fn test_add_regex_label() {
        let mut q = QueryExpression::parse(BINARY).unwrap();
        q.add_regex_label("az", ".*us-east-1.*", true).unwrap();

        assert_eq!(
            q.to_string(),
            r#"foo_metric{az=~".*us-east-1.*",role="bar"} - qux_metric{az=~".*us-east-1.*",role!="baz"}"#
        );
    }

    #[test]
    fn test_add_not_regex_label() {
        let mut q = QueryExpression::parse(BINARY).unwrap();
        q.add_regex_label("az", ".*us-east-1.*", false).unwrap();

        assert_eq!(
            q.to_string(),
            r#"foo_metric{az!~".*us-east-1.*",role="bar"} - qux_metric{az!~".*us-east-1.*",role!="baz"}"#
        );
    }

    #[test]
    fn test_label_injection_is_idempotent() {
        let mut once = QueryExpression::parse(BINARY).unwrap();
        once.add_label("az", "us-east-1", MatchKind::Equal).unwrap();
        let mut twice = once.clone();
        twice.add_label("az", "us-east-1", MatchKind::Equal).unwrap();

        assert_eq!(once.to_string(), twice.to_string());
        assert_eq!(matcher_counts(&twice), vec![2, 2]);
    }

    #[test]
    fn test_label_injected_into_range_selectors() {
        let mut q = QueryExpression::parse("rate(errors_total[5m]) / rate(requests_total[5m])")
            .unwrap();
        q.add_equal_label("env", "prod", true).unwrap();

        assert_eq!(
            q.to_string(),
            r#"rate(errors_total{env="prod"}[5m]) / rate(requests_total{env="prod"}[5m])"#
        );
    }

    #[test]
    fn test_full_promql_grammar_accepted() {
        for query in [
            "max_over_time(rate(x[5m])[1h:1m])",
            "x @ 1609746000",
            "x offset -5m",
            "rate(x[5m:])",
            r#"histogram_quantile(0.99, sum by (le) (rate(http_request_duration_seconds_bucket{job="api"}[5m])))"#,
            "topk(3, sum without (instance) (up))",
        ] {
            assert!(QueryExpression::parse(query).is_ok(), "{query} should parse");
        }
    }

    #[test]
    fn test_label_injected_into_subqueries() {
        let mut q = QueryExpression::parse("max_over_time(rate(x[5m])[1h:1m])").unwrap();
        q.add_equal_label("env", "prod", true).unwrap();

        let selectors = q.selectors();
        assert_eq!(selectors.len(), 1);
        assert_eq!(selectors[0].matchers.len(), 1);
        assert!(q.to_string().contains(r#"x{env="prod"}[5m]"#), "{q}");
    }

    #[test]
    fn test_deeply_nested_query_rejected_without_overflow() {
        let query = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        let err = QueryExpression::parse(&query).unwrap_err();
        assert!(matches!(err, QueryError::TooComplex { .. }), "{err:?}");

        let query = format!("1{}", "+1".repeat(200_000));
        assert!(matches!(
            QueryExpression::parse(&query),
            Err(QueryError::TooComplex { .. })
        ));
    }

    #[test]
    fn test_name_matcher_moves_outside_braces() {
        let q = QueryExpression::parse(r#"{__name__="up",job="node"}"#).unwrap();
        assert_eq!(q.to_string(), r#"up{job="node"}"#);
        assert_eq!(q, QueryExpression::parse(r#"up{job = "node"}"#).unwrap());

        let q = QueryExpression::parse(r#"{__name__=~"up|down"}"#).unwrap();
        assert_eq!(q.selectors()[0].name, None);
    }

    #[test]
    fn test_invalid_regex_label_rejected() {
        let mut q = QueryExpression::parse(BINARY).unwrap();
        let err = q.add_regex_label("az", "([", true).unwrap_err();
        assert!(matches!(err, QueryError::InvalidRegex { .. }));
        assert_eq!(q.to_string(), BINARY);
    }

    #[test]
    fn test_parse_error_surfaces_immediately() {
        assert!(matches!(
            QueryExpression::parse("sum(foo"),
            Err(QueryError::Parse(_))
        ));
        assert!("foo{".parse::<QueryExpression>().is_err());
    }

    #[test]
    fn test_source_preserved() {
        let q = QueryExpression::parse("sum( foo )").unwrap();
        assert_eq!(q.source(), "sum( foo )");
        assert_eq!(q.to_string(), "sum(foo)");
    }
}
