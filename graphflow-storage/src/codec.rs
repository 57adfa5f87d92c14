//! ABOUTME: JSON encode/decode with raw-string fallback for stored values

use serde_json::Value;

pub fn encode(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Decodes a stored column back into a `Value`. Falls back to a plain
/// string when the column does not parse as JSON, so a value written by
/// an older, non-JSON-aware schema is never mistaken for a decode error.
pub fn decode(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_structured_values() {
        let v = json!({"a": [1, 2], "b": "text"});
        assert_eq!(decode(&encode(&v)), v);
    }

    #[test]
    fn falls_back_to_raw_string_on_non_json() {
        assert_eq!(decode("not json at all {"), Value::String("not json at all {".into()));
    }
}
