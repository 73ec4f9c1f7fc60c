//! Condition evaluation and ordering for in-memory documents.

use std::cmp::Ordering;

use serde_json::Value;
use storefront_core::Document;
use storefront_storage::{Condition, MatchMode, SortDirection, SortSpec};

/// Check if a document satisfies a single condition.
pub fn matches(condition: &Condition, doc: &Document) -> bool {
    match condition {
        Condition::Eq { field, value } => match_eq(doc.get(field), value),
        Condition::Match { field, mode, term } => doc
            .get(field)
            .is_some_and(|v| match_text(v, *mode, &term.to_lowercase())),
    }
}

/// Check if a document satisfies every condition.
pub fn matches_all(conditions: &[Condition], doc: &Document) -> bool {
    conditions.iter().all(|c| matches(c, doc))
}

fn match_eq(field_value: Option<&Value>, expected: &Value) -> bool {
    match field_value {
        // A missing field only equals an explicit null.
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| scalar_eq(item, expected))
        }
        Some(actual) => scalar_eq(actual, expected),
    }
}

fn scalar_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => actual == expected,
    }
}

fn match_text(value: &Value, mode: MatchMode, needle: &str) -> bool {
    match value {
        Value::String(s) => {
            let haystack = s.to_lowercase();
            match mode {
                MatchMode::Exact => haystack == needle,
                MatchMode::Contains => haystack.contains(needle),
                MatchMode::StartsWith => haystack.starts_with(needle),
                MatchMode::EndsWith => haystack.ends_with(needle),
            }
        }
        Value::Array(items) => items.iter().any(|v| match_text(v, mode, needle)),
        _ => false,
    }
}

/// Order two documents by the sort field. Missing and null values sort last
/// in both directions.
pub fn compare_by(sort: &SortSpec, a: &Document, b: &Document) -> Ordering {
    let left = a.get(&sort.field).filter(|v| !v.is_null());
    let right = b.get(&sort.field).filter(|v| !v.is_null());
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(l), Some(r)) => {
            let ord = compare_values(l, r);
            match sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
