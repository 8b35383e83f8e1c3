//! Lenient evaluation of filter expressions against record snapshots.
//!
//! Lookup failures and cross-type orderings never surface as errors: the
//! failing comparison evaluates to `false` and boolean logic carries on from
//! there. A `not` over a failing comparison is therefore `true`.

use super::expr::{CompareOp, FieldPath, Filter};
use crate::types::canonical_value;
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Check whether a snapshot satisfies a filter.
pub fn matches(model: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Compare { op, field, value } => compare(model, *op, field, value).unwrap_or(false),
        Filter::And(children) => children.iter().all(|child| matches(model, child)),
        Filter::Or(children) => children.iter().any(|child| matches(model, child)),
        Filter::Not(inner) => !matches(model, inner),
    }
}

/// Walk a dot path through nested objects.
pub fn get_field<'a>(model: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments()
        .try_fold(model, |current, segment| current.as_object()?.get(segment))
}

/// `None` when the field is missing or the operands cannot be ordered.
fn compare(model: &Value, op: CompareOp, field: &FieldPath, value: &Value) -> Option<bool> {
    let field_value = get_field(model, field)?;

    if op == CompareOp::Eq {
        return Some(values_equal(field_value, value));
    }

    let ordering = order(field_value, value)?;
    Some(match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Lte => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Gte => ordering != Ordering::Less,
        CompareOp::Eq => ordering == Ordering::Equal,
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            canonical_value(a) == canonical_value(b)
        }
        _ => a == b,
    }
}

/// Only numbers with numbers and strings with strings are orderable.
fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}
