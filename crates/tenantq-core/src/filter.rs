//! Filter expressions evaluated by the store after key-based retrieval.
//!
//! A filter narrows what a page returns but not what it reads: the per-call
//! limit counts records evaluated before filtering, as DynamoDB does.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FilterError;
use crate::types::Record;

/// A filter expression that can be evaluated against a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FilterExpr {
    /// Reference to a record attribute. Supports dot-separated nested paths.
    Attr(String),
    /// A literal JSON value.
    Literal(Value),

    Eq(Box<FilterExpr>, Box<FilterExpr>),
    Ne(Box<FilterExpr>, Box<FilterExpr>),
    Lt(Box<FilterExpr>, Box<FilterExpr>),
    Le(Box<FilterExpr>, Box<FilterExpr>),
    Gt(Box<FilterExpr>, Box<FilterExpr>),
    Ge(Box<FilterExpr>, Box<FilterExpr>),
    Between(Box<FilterExpr>, Box<FilterExpr>, Box<FilterExpr>),

    BeginsWith(Box<FilterExpr>, String),
    Contains(Box<FilterExpr>, Value),

    AttributeExists(String),
    AttributeNotExists(String),

    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
}

/// Maximum nesting depth for filter expressions.
const MAX_EXPRESSION_DEPTH: usize = 16;

static NULL: Value = Value::Null;

impl FilterExpr {
    /// Evaluate this filter against a record.
    pub fn eval(&self, record: &Record) -> Result<bool, FilterError> {
        self.eval_inner(record, 0)
    }

    fn eval_inner(&self, record: &Record, depth: usize) -> Result<bool, FilterError> {
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(FilterError::InvalidExpression(format!(
                "expression depth exceeds maximum of {MAX_EXPRESSION_DEPTH}"
            )));
        }

        match self {
            FilterExpr::Attr(_) | FilterExpr::Literal(_) => Err(FilterError::InvalidExpression(
                "leaf node cannot be evaluated as a boolean".to_string(),
            )),

            FilterExpr::Eq(l, r) => Ok(compare(l, r, record)? == Some(Ordering::Equal)),
            FilterExpr::Ne(l, r) => Ok(compare(l, r, record)? != Some(Ordering::Equal)),
            FilterExpr::Lt(l, r) => Ok(compare(l, r, record)? == Some(Ordering::Less)),
            FilterExpr::Le(l, r) => Ok(matches!(
                compare(l, r, record)?,
                Some(Ordering::Less | Ordering::Equal)
            )),
            FilterExpr::Gt(l, r) => Ok(compare(l, r, record)? == Some(Ordering::Greater)),
            FilterExpr::Ge(l, r) => Ok(matches!(
                compare(l, r, record)?,
                Some(Ordering::Greater | Ordering::Equal)
            )),
            FilterExpr::Between(val, low, high) => {
                let ge_low = matches!(
                    compare(val, low, record)?,
                    Some(Ordering::Greater | Ordering::Equal)
                );
                let le_high = matches!(
                    compare(val, high, record)?,
                    Some(Ordering::Less | Ordering::Equal)
                );
                Ok(ge_low && le_high)
            }

            FilterExpr::BeginsWith(expr, prefix) => match resolve_expr(expr, record)? {
                Value::String(s) => Ok(s.starts_with(prefix.as_str())),
                _ => Ok(false),
            },
            FilterExpr::Contains(expr, search) => {
                match (resolve_expr(expr, record)?, search) {
                    (Value::String(s), Value::String(needle)) => Ok(s.contains(needle.as_str())),
                    (Value::Array(arr), item) => Ok(arr.contains(item)),
                    _ => Ok(false),
                }
            }

            FilterExpr::AttributeExists(path) => Ok(!resolve_attr(record, path).is_null()),
            FilterExpr::AttributeNotExists(path) => Ok(resolve_attr(record, path).is_null()),

            FilterExpr::And(exprs) => {
                for expr in exprs {
                    if !expr.eval_inner(record, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            FilterExpr::Or(exprs) => {
                for expr in exprs {
                    if expr.eval_inner(record, depth + 1)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            FilterExpr::Not(expr) => Ok(!expr.eval_inner(record, depth + 1)?),
        }
    }
}

fn compare(
    left: &FilterExpr,
    right: &FilterExpr,
    record: &Record,
) -> Result<Option<Ordering>, FilterError> {
    let l = resolve_expr(left, record)?;
    let r = resolve_expr(right, record)?;
    Ok(compare_values(l, r))
}

/// Resolve an operand to a concrete JSON value.
fn resolve_expr<'a>(expr: &'a FilterExpr, record: &'a Record) -> Result<&'a Value, FilterError> {
    match expr {
        FilterExpr::Attr(path) => Ok(resolve_attr(record, path)),
        FilterExpr::Literal(val) => Ok(val),
        _ => Err(FilterError::InvalidExpression(
            "expected attribute or literal in comparison position".to_string(),
        )),
    }
}

/// Resolve a dot-separated attribute path on a record.
///
/// Returns `Value::Null` if any segment is missing.
pub fn resolve_attr<'a>(record: &'a Record, path: &str) -> &'a Value {
    let mut segments = path.split('.');
    let Some(mut current) = segments.next().and_then(|first| record.get(first)) else {
        return &NULL;
    };
    for segment in segments {
        match current.get(segment) {
            Some(v) => current = v,
            None => return &NULL,
        }
    }
    current
}

/// Compare two JSON values, returning an ordering if the types are comparable.
///
/// Numbers compare as f64, strings lexicographically, booleans false < true,
/// and null equals null. Mismatched types are incomparable.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl FilterExpr {
    pub fn attr(name: impl Into<String>) -> Self {
        FilterExpr::Attr(name.into())
    }

    pub fn literal(val: impl Into<Value>) -> Self {
        FilterExpr::Literal(val.into())
    }

    pub fn eq(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Eq(Box::new(left), Box::new(right))
    }

    pub fn ne(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Ne(Box::new(left), Box::new(right))
    }

    pub fn lt(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Lt(Box::new(left), Box::new(right))
    }

    pub fn le(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Le(Box::new(left), Box::new(right))
    }

    pub fn gt(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Gt(Box::new(left), Box::new(right))
    }

    pub fn ge(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Ge(Box::new(left), Box::new(right))
    }

    pub fn between(val: FilterExpr, low: FilterExpr, high: FilterExpr) -> Self {
        FilterExpr::Between(Box::new(val), Box::new(low), Box::new(high))
    }

    pub fn begins_with(expr: FilterExpr, prefix: impl Into<String>) -> Self {
        FilterExpr::BeginsWith(Box::new(expr), prefix.into())
    }

    pub fn contains(expr: FilterExpr, search: impl Into<Value>) -> Self {
        FilterExpr::Contains(Box::new(expr), search.into())
    }

    pub fn attribute_exists(path: impl Into<String>) -> Self {
        FilterExpr::AttributeExists(path.into())
    }

    pub fn attribute_not_exists(path: impl Into<String>) -> Self {
        FilterExpr::AttributeNotExists(path.into())
    }

    pub fn and(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::And(exprs)
    }

    pub fn or(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::Or(exprs)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: FilterExpr) -> Self {
        FilterExpr::Not(Box::new(expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log_record() -> Record {
        json!({
            "groupid": "group1",
            "created_at": "2024-03-01T12:00:00Z",
            "userid": "user1@example.com",
            "type": "login",
            "attempts": 3,
            "meta": {"ip": "10.0.0.1", "agent": {"os": "linux"}},
            "tags": ["web", "mfa"],
            "message": null
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_eq_and_ne() {
        let r = log_record();
        let is_login = FilterExpr::eq(FilterExpr::attr("type"), FilterExpr::literal("login"));
        let not_login = FilterExpr::ne(FilterExpr::attr("type"), FilterExpr::literal("login"));
        assert!(is_login.eval(&r).unwrap());
        assert!(!not_login.eval(&r).unwrap());
    }

    #[test]
    fn test_numeric_comparisons() {
        let r = log_record();
        let attempts = || FilterExpr::attr("attempts");
        assert!(FilterExpr::gt(attempts(), FilterExpr::literal(2)).eval(&r).unwrap());
        assert!(FilterExpr::ge(attempts(), FilterExpr::literal(3)).eval(&r).unwrap());
        assert!(FilterExpr::le(attempts(), FilterExpr::literal(3.0)).eval(&r).unwrap());
        assert!(!FilterExpr::lt(attempts(), FilterExpr::literal(3)).eval(&r).unwrap());
    }

    #[test]
    fn test_between_timestamps() {
        let r = log_record();
        let f = FilterExpr::between(
            FilterExpr::attr("created_at"),
            FilterExpr::literal("2024-03-01T00:00:00Z"),
            FilterExpr::literal("2024-03-01T23:59:59Z"),
        );
        assert!(f.eval(&r).unwrap());
    }

    #[test]
    fn test_begins_with_and_contains() {
        let r = log_record();
        assert!(
            FilterExpr::begins_with(FilterExpr::attr("userid"), "user1")
                .eval(&r)
                .unwrap()
        );
        assert!(
            FilterExpr::contains(FilterExpr::attr("tags"), "mfa")
                .eval(&r)
                .unwrap()
        );
        assert!(
            !FilterExpr::contains(FilterExpr::attr("attempts"), "3")
                .eval(&r)
                .unwrap()
        );
    }

    #[test]
    fn test_nested_paths_and_existence() {
        let r = log_record();
        let os = FilterExpr::eq(FilterExpr::attr("meta.agent.os"), FilterExpr::literal("linux"));
        assert!(os.eval(&r).unwrap());
        assert!(FilterExpr::attribute_exists("meta.ip").eval(&r).unwrap());
        assert!(FilterExpr::attribute_not_exists("meta.port").eval(&r).unwrap());
        // Null attributes count as absent.
        assert!(FilterExpr::attribute_not_exists("message").eval(&r).unwrap());
    }

    #[test]
    fn test_boolean_logic() {
        let r = log_record();
        let yes = FilterExpr::attribute_exists("type");
        let no = FilterExpr::attribute_exists("nope");
        assert!(FilterExpr::and(vec![yes.clone(), yes.clone()]).eval(&r).unwrap());
        assert!(!FilterExpr::and(vec![yes.clone(), no.clone()]).eval(&r).unwrap());
        assert!(FilterExpr::or(vec![no.clone(), yes.clone()]).eval(&r).unwrap());
        assert!(FilterExpr::not(no).eval(&r).unwrap());
        assert!(FilterExpr::and(vec![]).eval(&r).unwrap());
        assert!(!FilterExpr::or(vec![]).eval(&r).unwrap());
    }

    #[test]
    fn test_type_mismatch_is_false() {
        let r = log_record();
        let f = FilterExpr::eq(FilterExpr::attr("attempts"), FilterExpr::literal("3"));
        assert!(!f.eval(&r).unwrap());
    }

    #[test]
    fn test_leaf_and_depth_errors() {
        let r = log_record();
        assert!(FilterExpr::attr("type").eval(&r).is_err());

        let mut deep = FilterExpr::attribute_exists("type");
        for _ in 0..=MAX_EXPRESSION_DEPTH {
            deep = FilterExpr::not(deep);
        }
        assert!(deep.eval(&r).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let f = FilterExpr::and(vec![
            FilterExpr::eq(FilterExpr::attr("type"), FilterExpr::literal("login")),
            FilterExpr::attribute_exists("userid"),
        ]);
        let json = serde_json::to_string(&f).unwrap();
        let back: FilterExpr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
