//! Row representation shared by the scanner, the rule engine and the executor.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row: field name to value, in the column order the scanner delivered.
pub type Record = IndexMap<String, Value>;

/// Render a field value the way it appears in issue text and string checks.
///
/// Strings are rendered without quotes, `null` as `null`, everything else
/// through its JSON form.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Whether the field is absent or explicitly null.
pub fn is_null_or_missing(record: &Record, field: &str) -> bool {
    matches!(record.get(field), None | Some(Value::Null))
}

/// Identifier attached to issues raised for a row.
///
/// `Known` carries the first column's value. This column is not guaranteed
/// to be a primary key, so two rows can share an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecordIdentifier {
    Known(String),
    /// 1-based position in scanner delivery order.
    Synthetic(usize),
}

impl RecordIdentifier {
    /// Pick the identifier for the `row_number`-th row (1-based).
    pub fn for_row(record: &Record, row_number: usize) -> Self {
        match record.first() {
            Some((_, Value::Null)) | None => RecordIdentifier::Synthetic(row_number),
            Some((_, Value::String(s))) if s.is_empty() => RecordIdentifier::Synthetic(row_number),
            Some((_, value)) => RecordIdentifier::Known(display_value(value)),
        }
    }
}

impl fmt::Display for RecordIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordIdentifier::Known(id) => write!(f, "{}", id),
            RecordIdentifier::Synthetic(n) => write!(f, "row_{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn identifier_uses_first_column() {
        let r = record(&[("id", json!(42)), ("name", json!("x"))]);
        assert_eq!(RecordIdentifier::for_row(&r, 1), RecordIdentifier::Known("42".into()));
        assert_eq!(RecordIdentifier::for_row(&r, 1).to_string(), "42");
    }

    #[test]
    fn identifier_falls_back_to_row_number() {
        let r = record(&[("id", Value::Null), ("name", json!("x"))]);
        let id = RecordIdentifier::for_row(&r, 7);
        assert_eq!(id, RecordIdentifier::Synthetic(7));
        assert_eq!(id.to_string(), "row_7");

        assert_eq!(RecordIdentifier::for_row(&Record::new(), 3).to_string(), "row_3");
    }

    #[test]
    fn display_value_strips_string_quotes() {
        assert_eq!(display_value(&json!("abc")), "abc");
        assert_eq!(display_value(&json!(1.5)), "1.5");
        assert_eq!(display_value(&Value::Null), "null");
        assert_eq!(display_value(&json!(true)), "true");
    }

    #[test]
    fn null_or_missing() {
        let r = record(&[("a", Value::Null), ("b", json!(""))]);
        assert!(is_null_or_missing(&r, "a"));
        assert!(is_null_or_missing(&r, "zzz"));
        assert!(!is_null_or_missing(&r, "b"));
    }
}
