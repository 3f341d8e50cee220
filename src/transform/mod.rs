//! Pure per-entity transforms: source document in, destination record out.
//!
//! Every destination column gets an explicit default so no record ever
//! omits a column. None of these functions perform I/O; they are plain
//! data mappings testable against literal fixtures.

pub mod chat;
pub mod crm;
pub mod options;

use serde_json::{Map, Value};

use crate::time::{normalize_timestamp, now_iso};

/// Free-text column: string value or empty string.
fn text(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Optional reference column: string value or `None`.
fn opt_text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Status-style column with a fixed sentinel default.
fn status(fields: &Map<String, Value>, key: &str, default: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Multi-valued identifier column: ordered list, never null.
fn id_list(fields: &Map<String, Value>, key: &str) -> Vec<String> {
    let Some(Value::Array(items)) = fields.get(key) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// Normalized timestamp column: `None` when absent, otherwise the ISO-8601
/// string (primitives pass through as their text form).
fn iso(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let value = fields.get(key)?;
    match normalize_timestamp(value) {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// `created_at` defaults to the current instant on collections without
/// native timestamps; `updated_at` falls back to `created_at`.
fn stamps(fields: &Map<String, Value>) -> (String, String) {
    let created = iso(fields, "created_at").unwrap_or_else(now_iso);
    let updated = iso(fields, "updated_at").unwrap_or_else(|| created.clone());
    (created, updated)
}

fn flag(fields: &Map<String, Value>, key: &str) -> bool {
    fields.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn number(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    fields.get(key).and_then(Value::as_f64)
}
