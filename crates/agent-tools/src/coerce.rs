//! Argument normalization for tool calls
//!
//! Backends emit tool arguments either as a bare scalar (`gold`, `5`,
//! `https://...`) or as a JSON object of named fields
//! (`{"query": "gold"}`). Both reach the tool as the same text.

use serde_json::Value;

/// Normalize a raw tool argument.
///
/// If `raw` parses as a JSON object containing `key`, the field is
/// returned (strings verbatim, other values as JSON text). In every other
/// case, including parse failures, non-object JSON, a missing key or no
/// key at all, `raw` is returned unchanged.
pub fn coerce_argument(raw: &str, key: Option<&str>) -> String {
    let Some(key) = key else {
        return raw.to_string();
    };

    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Object(fields)) => match fields.get(key) {
            Some(Value::String(value)) => value.clone(),
            Some(Value::Null) | None => raw.to_string(),
            Some(other) => other.to_string(),
        },
        _ => raw.to_string(),
    }
}
