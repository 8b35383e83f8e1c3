//! Core types shared by dealers and subscriptions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Field snapshot of a model record.
///
/// Usually a JSON object; nested objects are addressed with dot paths by
/// filter expressions.
pub type ModelData = serde_json::Value;

/// Unique identifier for a subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a subscription item.
///
/// Two items are the same item only if they share this id, regardless of
/// their subscription or query.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u64);

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

impl ItemId {
    /// Allocate a process-unique item id.
    pub fn next() -> Self {
        ItemId(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rewrite a value so equal numbers share one representation.
///
/// Floats with an integral value that fits `i64` or `u64` become integers,
/// at any depth inside arrays and objects. `1.0` and `1` therefore compare
/// equal once canonical, while `1.5` is left alone.
pub fn canonical_value(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Number(n) => Value::Number(canonical_number(n)),
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn canonical_number(n: &serde_json::Number) -> serde_json::Number {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 => {
            // 2^63 and 2^64 are exact as f64; both bounds are exclusive
            if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                (f as i64).into()
            } else if f >= 0.0 && f < u64::MAX as f64 {
                (f as u64).into()
            } else {
                n.clone()
            }
        }
        _ => n.clone(),
    }
}

/// Hashable form of an equality key.
///
/// Built from the JSON text of the [canonical](canonical_value) value, so
/// `"red"` and `"red"` collide, `1` and `1.0` collide, while `"1"` and `1`
/// do not. Object keys are sorted by `serde_json`, which makes object keys
/// canonical too.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(String);

impl QueryKey {
    /// Key for a JSON value.
    pub fn from_value(value: &serde_json::Value) -> Self {
        QueryKey(canonical_value(value).to_string())
    }

    /// Canonical text of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&serde_json::Value> for QueryKey {
    fn from(value: &serde_json::Value) -> Self {
        QueryKey::from_value(value)
    }
}

impl From<&str> for QueryKey {
    fn from(s: &str) -> Self {
        QueryKey::from_value(&serde_json::Value::String(s.to_string()))
    }
}

impl fmt::Debug for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryKey({})", self.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
