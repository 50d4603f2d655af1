use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod issuer;
pub mod officer;
pub mod recordkeeping;
pub mod restriction;
pub mod security;
pub mod shareholder;
pub mod tx;

/// An id assigned by the backend. We never generate these ourselves, and
/// don't care whether the backend uses integers or uuids, so the raw JSON
/// value is kept and written back verbatim in foreign keys.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Value);

impl RecordId {
    /// Accepts the `id` field of an echoed row. Null, empty strings, and
    /// non-scalar values are not ids.
    pub fn from_value(v: &Value) -> Option<RecordId> {
        match v {
            Value::String(s) if !s.is_empty() => Some(RecordId(v.clone())),
            Value::Number(_) => Some(RecordId(v.clone())),
            _ => None,
        }
    }

    /// Reads the `id` field out of a row returned by the backend.
    pub fn from_row(row: &Value) -> Option<RecordId> {
        row.get("id").and_then(RecordId::from_value)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Value::String(s) => write!(f, "{s}"),
            v => write!(f, "{v}"),
        }
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId(Value::String(value.to_string()))
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId(Value::from(value))
    }
}

/// Overwrites `dst` with `src`, unless `src` is blank.
///
/// This is how duplicate entity rows are merged: a later row wins for
/// every field it actually fills in.
pub(crate) fn merge_str(dst: &mut String, src: String) {
    if !src.trim().is_empty() {
        *dst = src;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{merge_str, RecordId};

    #[test]
    fn test_record_id_from_row() {
        assert_eq!(RecordId::from_row(&json!({"id": 7})), Some(RecordId::from(7)));
        assert_eq!(
            RecordId::from_row(&json!({"id": "9f1c"})),
            Some(RecordId::from("9f1c"))
        );
        assert_eq!(RecordId::from_row(&json!({"id": null})), None);
        assert_eq!(RecordId::from_row(&json!({"id": ""})), None);
        assert_eq!(RecordId::from_row(&json!({"name": "x"})), None);
    }

    #[test]
    fn test_record_id_display() {
        assert_eq!(RecordId::from(12).to_string(), "12");
        assert_eq!(RecordId::from("ab-12").to_string(), "ab-12");
    }

    #[test]
    fn test_merge_str() {
        let mut s = "old".to_string();
        merge_str(&mut s, "  ".to_string());
        assert_eq!(s, "old");
        merge_str(&mut s, "new".to_string());
        assert_eq!(s, "new");
    }
}
