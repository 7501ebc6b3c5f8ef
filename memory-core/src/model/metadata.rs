//! Bounded JSON metadata attached to messages.
//!
//! Metadata arrives at the boundary as an arbitrary [`serde_json::Value`]. The
//! sanitiser in this module enforces the documented limits (depth, element
//! count, string length) before a value is allowed anywhere near the store;
//! nothing downstream needs to re-check these invariants.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum nesting depth for metadata (arrays/objects count as one level).
pub const MAX_DEPTH: usize = 4;
/// Maximum number of keys (object) or elements (array) per container level.
pub const MAX_ELEMS_PER_LEVEL: usize = 50;
/// String values longer than this are truncated.
pub const MAX_STRING_LEN: usize = 2048;

/// Sanitised metadata, guaranteed to satisfy [`MAX_DEPTH`], [`MAX_ELEMS_PER_LEVEL`]
/// and [`MAX_STRING_LEN`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Metadata(Value);

impl Metadata {
    /// Empty metadata (`{}`).
    #[must_use]
    pub fn empty() -> Self {
        Self(Value::Object(serde_json::Map::new()))
    }

    /// Sanitise an arbitrary JSON value into bounded metadata.
    ///
    /// Depth is truncated by replacing over-deep containers with `null`;
    /// containers are truncated to their first [`MAX_ELEMS_PER_LEVEL`]
    /// entries; strings are truncated to [`MAX_STRING_LEN`] chars.
    #[must_use]
    pub fn sanitize(value: Value) -> Self {
        Self(sanitize_value(value, 0))
    }

    /// Borrow the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume and return the underlying JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Metadata {
    fn from(value: Value) -> Self {
        Metadata::sanitize(value)
    }
}

fn sanitize_value(value: Value, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return match value {
            Value::Array(_) | Value::Object(_) => Value::Null,
            other => truncate_scalar(other),
        };
    }

    match value {
        Value::String(s) => Value::String(truncate_str(&s)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .take(MAX_ELEMS_PER_LEVEL)
                .map(|v| sanitize_value(v, depth + 1))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .take(MAX_ELEMS_PER_LEVEL)
                .map(|(k, v)| (k, sanitize_value(v, depth + 1)))
                .collect(),
        ),
        other => other,
    }
}

fn truncate_scalar(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_str(&s)),
        other => other,
    }
}

fn truncate_str(s: &str) -> String {
    if s.chars().count() <= MAX_STRING_LEN {
        s.to_string()
    } else {
        s.chars().take(MAX_STRING_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncates_long_strings() {
        let long = "a".repeat(MAX_STRING_LEN + 100);
        let sanitized = Metadata::sanitize(json!({ "note": long }));
        let note = sanitized.as_value()["note"].as_str().unwrap();
        assert_eq!(note.chars().count(), MAX_STRING_LEN);
    }

    #[test]
    fn caps_container_size() {
        let big_array: Vec<i32> = (0..200).collect();
        let sanitized = Metadata::sanitize(json!({ "list": big_array }));
        let list = sanitized.as_value()["list"].as_array().unwrap();
        assert_eq!(list.len(), MAX_ELEMS_PER_LEVEL);
    }

    #[test]
    fn collapses_excess_depth() {
        let deep = json!({ "a": { "b": { "c": { "d": { "e": "too deep" } } } } });
        let sanitized = Metadata::sanitize(deep);
        // Level 0: a, 1: b, 2: c, 3: d (depth reaches MAX_DEPTH here, contents replaced)
        let d = &sanitized.as_value()["a"]["b"]["c"]["d"];
        assert_eq!(*d, Value::Null);
    }

    #[test]
    fn empty_is_object() {
        assert_eq!(Metadata::empty().as_value(), &json!({}));
    }
}
