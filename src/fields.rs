use serde_json::{Map, Value};

use crate::time::{is_native_timestamp, normalize_timestamp};

/// Rename top-level keys per an old-name → new-name table; every other key
/// copies verbatim. Renaming is shallow on purpose: nested values are
/// expected to be primitives or arrays by the time a record reaches the
/// mapper.
pub fn rename_fields(record: &Map<String, Value>, table: &[(&str, &str)]) -> Map<String, Value> {
    let mut out = Map::with_capacity(record.len());
    for (key, value) in record {
        let name = table
            .iter()
            .find(|(old, _)| *old == key.as_str())
            .map(|(_, new)| (*new).to_string())
            .unwrap_or_else(|| key.clone());
        out.insert(name, value.clone());
    }
    out
}

/// Convert every native timestamp object found anywhere in the value,
/// recursing into nested maps and arrays. This is the one deep path; key
/// renaming stays shallow.
///
/// The destination columns are all flat, so the per-entity transforms only
/// normalize top-level stamps and never reach for this. It is the contract
/// for callers that keep nested documents intact, e.g. archiving a raw
/// record next to its relational form.
pub fn deep_normalize_timestamps(value: &Value) -> Value {
    if is_native_timestamp(value) {
        return normalize_timestamp(value);
    }
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), deep_normalize_timestamps(v)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(deep_normalize_timestamps).collect())
        }
        other => other.clone(),
    }
}
