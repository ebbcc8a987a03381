//! Defensive accessors for loosely shaped JSON payloads.
//!
//! Payloads come from several producers and older engine versions, so every
//! accessor returns `None` for a missing key, a wrong type or a non-object
//! parent instead of failing.

use serde_json::Value;

/// Child object under `key`, if the parent is an object and the child is too.
pub fn object_field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|child| child.is_object())
}

/// Trimmed, non-empty string under `key`.
pub fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Finite number under `key`.
pub fn finite_f64(value: &Value, key: &str) -> Option<f64> {
    value.get(key)?.as_f64().filter(|v| v.is_finite())
}

/// String elements of an array under `key`; other element types are skipped.
pub fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
