use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current instant as an ISO-8601 (RFC 3339) UTC string.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert a source-native timestamp value to an ISO-8601 string.
///
/// Native timestamps arrive as objects carrying `_seconds`/`_nanoseconds`
/// (export style) or `seconds`/`nanoseconds`. `Null` stays `Null`. Anything
/// else passes through unchanged: strings and numbers are assumed to be
/// primitive already, and malformed values propagate as-is rather than
/// erroring here.
pub fn normalize_timestamp(value: &Value) -> Value {
    let Value::Object(map) = value else {
        return value.clone();
    };
    let seconds = map
        .get("_seconds")
        .or_else(|| map.get("seconds"))
        .and_then(Value::as_i64);
    let Some(seconds) = seconds else {
        return value.clone();
    };
    let nanos = map
        .get("_nanoseconds")
        .or_else(|| map.get("nanoseconds"))
        .and_then(Value::as_i64)
        .filter(|n| (0..1_000_000_000).contains(n))
        .unwrap_or(0);
    match DateTime::<Utc>::from_timestamp(seconds, nanos as u32) {
        Some(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => value.clone(),
    }
}

/// True if the value is a native timestamp object `normalize_timestamp`
/// would convert.
pub fn is_native_timestamp(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map
        .get("_seconds")
        .or_else(|| map.get("seconds"))
        .and_then(Value::as_i64)
        .is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_stays_null() {
        assert_eq!(normalize_timestamp(&Value::Null), Value::Null);
    }

    #[test]
    fn native_object_becomes_iso_string() {
        let ts = json!({ "_seconds": 1_700_000_000, "_nanoseconds": 500_000_000 });
        let out = normalize_timestamp(&ts);
        assert_eq!(out, json!("2023-11-14T22:13:20.500Z"));
    }

    #[test]
    fn underscore_free_keys_are_accepted() {
        let ts = json!({ "seconds": 0, "nanoseconds": 0 });
        assert_eq!(normalize_timestamp(&ts), json!("1970-01-01T00:00:00.000Z"));
    }

    #[test]
    fn primitive_string_passes_through() {
        let v = json!("2024-01-01T00:00:00Z");
        assert_eq!(normalize_timestamp(&v), v);
    }

    #[test]
    fn primitive_number_passes_through() {
        let v = json!(1_700_000_000);
        assert_eq!(normalize_timestamp(&v), v);
    }

    #[test]
    fn malformed_object_passes_through() {
        let v = json!({ "_seconds": "not a number" });
        assert_eq!(normalize_timestamp(&v), v);
    }

    #[test]
    fn negative_nanos_are_dropped() {
        let ts = json!({ "_seconds": 10, "_nanoseconds": -5 });
        assert_eq!(normalize_timestamp(&ts), json!("1970-01-01T00:00:10.000Z"));
    }

    #[test]
    fn now_iso_is_rfc3339() {
        let now = now_iso();
        assert!(chrono::DateTime::parse_from_rfc3339(&now).is_ok());
    }
}
