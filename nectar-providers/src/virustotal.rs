//! File scanner payload normalization.
//!
//! Scanner SDKs wrap reports in types that are not natively
//! JSON-serializable; whatever transport produced the value must
//! convert it to plain JSON before it crosses this boundary, and
//! [`normalize_report`] is that boundary. It accepts only an object at
//! the top level, walks the structure to a bounded depth, and renders
//! anything deeper as a string, so no opaque wrapper shape can leak
//! into the cache.

use serde_json::{Map, Value, json};

/// Recursion bound for pathological nesting; subtrees below it are
/// rendered as compact JSON strings.
const MAX_DEPTH: usize = 32;

/// Normalize a raw scanner report into cacheable plain JSON.
///
/// Non-object responses (the scanner occasionally returns bare strings
/// on edge paths) are discarded as `None`.
#[must_use]
pub fn normalize_report(raw: Value) -> Option<Value> {
    if raw.is_object() {
        Some(normalize_value(raw, 0))
    } else {
        None
    }
}

fn normalize_value(value: Value, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return Value::String(serde_json::to_string(&value).unwrap_or_default());
    }
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key, normalize_value(item, depth + 1));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| normalize_value(item, depth + 1))
                .collect(),
        ),
        primitive => primitive,
    }
}

/// Extract the analysis statistics block, zero-filled when absent.
#[must_use]
pub fn extract_analysis_stats(payload: &Value) -> Value {
    let stats = payload
        .pointer("/data/attributes/last_analysis_stats")
        .and_then(Value::as_object);
    let field = |name: &str| {
        stats
            .and_then(|s| s.get(name))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    };
    let total: i64 = stats
        .map(|s| s.values().filter_map(Value::as_i64).sum())
        .unwrap_or(0);
    json!({
        "harmless": field("harmless"),
        "malicious": field("malicious"),
        "suspicious": field("suspicious"),
        "undetected": field("undetected"),
        "timeout": field("timeout"),
        "confirmed_timeout": field("confirmed-timeout"),
        "failure": field("failure"),
        "type_unsupported": field("type-unsupported"),
        "total_scans": total,
    })
}

/// Whether the report crosses the malicious-detection threshold.
#[must_use]
pub fn is_malicious(payload: &Value, threshold: i64) -> bool {
    extract_analysis_stats(payload)
        .get("malicious")
        .and_then(Value::as_i64)
        .unwrap_or(0)
        >= threshold
}
