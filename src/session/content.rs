//! Content resolution over heterogeneous session records.
//!
//! Upstream sources label the text of a message or memory entry `content`,
//! `text`, or `message` – or hand over a structured object with no text
//! field at all.  [`resolve_content`] applies one first-match-wins rule
//! everywhere content is scanned, so every detector sees the same plain
//! string for the same record.

use serde_json::Value;

/// Resolve an arbitrary message/memory record to a plain string.
///
/// Priority:
/// 1. the value itself, when already a string;
/// 2. a `content` field (JSON-serialized when non-string);
/// 3. a `text` field, when a string;
/// 4. a `message` field (JSON-serialized when non-string);
/// 5. fallback: JSON-serialize the whole record.
#[must_use]
pub fn resolve_content(record: &Value) -> String {
    if let Some(s) = record.as_str() {
        return s.to_owned();
    }
    if let Some(obj) = record.as_object() {
        if let Some(content) = obj.get("content") {
            return stringify(content);
        }
        if let Some(text) = obj.get("text").and_then(Value::as_str) {
            return text.to_owned();
        }
        if let Some(message) = obj.get("message") {
            return stringify(message);
        }
    }
    record.to_string()
}

/// Render a JSON value as plain text: strings verbatim, everything else
/// JSON-serialized.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_owned(),
        None => value.to_string(),
    }
}

/// Fetch a string field from a record, tolerating absence and non-objects.
#[must_use]
pub fn field_str<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// The role (or `type`) of a message record, when resolvable.
#[must_use]
pub fn record_role(record: &Value) -> Option<&str> {
    field_str(record, "role").or_else(|| field_str(record, "type"))
}

// ── Tests ──────────────────────────────────────────────────────────────
