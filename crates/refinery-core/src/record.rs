//! The record model and field access helpers.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::FieldAccessError;

/// A record flowing through the pipeline: field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Fetch a field that a rule cannot do without.
pub fn require<'a>(record: &'a Record, field: &str) -> Result<&'a Value, FieldAccessError> {
    record
        .get(field)
        .ok_or_else(|| FieldAccessError::Missing(field.to_string()))
}

/// Fetch a field that must hold a string.
pub fn require_str<'a>(record: &'a Record, field: &str) -> Result<&'a str, FieldAccessError> {
    require(record, field)?
        .as_str()
        .ok_or_else(|| FieldAccessError::NotAString(field.to_string()))
}

/// Text form of a value, used for lookup-table keys and template output.
/// Strings render verbatim, everything else as JSON text.
pub fn text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}
