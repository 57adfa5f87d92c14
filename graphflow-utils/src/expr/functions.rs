//! ABOUTME: Pure helper functions always present in the evaluation env
//! ABOUTME: json/safe/debug/default - never wrapped, never swallowed

use serde_json::Value;

pub fn json_encode(value: &Value) -> Value {
    Value::String(serde_json::to_string(value).unwrap_or_default())
}

pub fn debug_encode(value: &Value) -> Value {
    Value::String(serde_json::to_string_pretty(value).unwrap_or_default())
}

/// Nil-safe dotted access: returns `Value::Null` as soon as any segment is
/// absent rather than erroring.
pub fn safe_access(root: &Value, path: &str) -> Value {
    let mut current = root.clone();
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        current = match current {
            Value::Object(ref map) => map.get(segment).cloned().unwrap_or(Value::Null),
            Value::Array(ref arr) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| arr.get(i).cloned())
                .unwrap_or(Value::Null),
            _ => Value::Null,
        };
        if current.is_null() {
            return Value::Null;
        }
    }
    current
}

/// `default(v, fallback)`: `fallback` when `v` is null or the empty string.
pub fn default_value(v: Value, fallback: Value) -> Value {
    match &v {
        Value::Null => fallback,
        Value::String(s) if s.is_empty() => fallback,
        _ => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn safe_access_stops_at_first_missing_segment() {
        let obj = json!({"a": {"b": {"c": 1}}});
        assert_eq!(safe_access(&obj, "a.b.c"), json!(1));
        assert_eq!(safe_access(&obj, "a.x.c"), Value::Null);
        assert_eq!(safe_access(&obj, "a.b.c.d"), Value::Null);
    }

    #[test]
    fn default_falls_back_on_null_or_empty_string() {
        assert_eq!(default_value(Value::Null, json!("fb")), json!("fb"));
        assert_eq!(default_value(json!(""), json!("fb")), json!("fb"));
        assert_eq!(default_value(json!("x"), json!("fb")), json!("x"));
        assert_eq!(default_value(json!(0), json!("fb")), json!(0));
    }

    #[test]
    fn json_round_trips_pure_data() {
        let original = json!({"a": [1, 2, 3], "b": "text"});
        let encoded = json_encode(&original);
        let Value::String(s) = encoded else { panic!() };
        let back: Value = serde_json::from_str(&s).unwrap();
        assert_eq!(back, original);
    }
}
