//! Condition mini-language used by pre/post conditions.
//!
//! Three forms are recognized:
//!
//! - `field IS NULL` (absent or null)
//! - `field IS NOT NULL` (present and not null)
//! - `field = literal` (literal may be wrapped in single or double quotes)
//!
//! Anything else parses to [`Condition::Always`] and evaluates to true.

use std::fmt;

use steward_core::record::{display_value, is_null_or_missing};
use steward_core::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    IsNull(String),
    IsNotNull(String),
    Equals { field: String, literal: String },
    Always,
}

impl Condition {
    pub fn parse(expression: &str) -> Self {
        let expr = expression.trim();
        let upper = expr.to_ascii_uppercase();

        if let Some(field) = strip_suffix_at(expr, &upper, " IS NOT NULL") {
            return field_name(field).map_or(Condition::Always, Condition::IsNotNull);
        }
        if let Some(field) = strip_suffix_at(expr, &upper, " IS NULL") {
            return field_name(field).map_or(Condition::Always, Condition::IsNull);
        }
        if let Some((lhs, rhs)) = expr.split_once('=') {
            if rhs.contains('=') {
                return Condition::Always;
            }
            if let Some(field) = field_name(lhs) {
                return Condition::Equals {
                    field,
                    literal: unquote(rhs.trim()).to_string(),
                };
            }
        }
        Condition::Always
    }

    pub fn evaluate(&self, record: &Record) -> bool {
        match self {
            Condition::IsNull(field) => is_null_or_missing(record, field),
            Condition::IsNotNull(field) => !is_null_or_missing(record, field),
            Condition::Equals { field, literal } => record
                .get(field)
                .map(|v| display_value(v) == *literal)
                .unwrap_or(false),
            Condition::Always => true,
        }
    }
}

/// Parse and evaluate in one step.
pub fn evaluate(expression: &str, record: &Record) -> bool {
    Condition::parse(expression).evaluate(record)
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::IsNull(field) => write!(f, "{} IS NULL", field),
            Condition::IsNotNull(field) => write!(f, "{} IS NOT NULL", field),
            Condition::Equals { field, literal } => write!(f, "{} = '{}'", field, literal),
            Condition::Always => write!(f, "TRUE"),
        }
    }
}

/// Case-insensitive suffix strip; `upper` is `expr` upper-cased.
fn strip_suffix_at<'a>(expr: &'a str, upper: &str, suffix: &str) -> Option<&'a str> {
    upper
        .ends_with(suffix)
        .then(|| &expr[..expr.len() - suffix.len()])
}

/// A field reference is a single non-empty token.
fn field_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        None
    } else {
        Some(name.to_string())
    }
}

fn unquote(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record() -> Record {
        let mut r = Record::new();
        r.insert("email".into(), json!("a@b.com"));
        r.insert("status".into(), json!("active"));
        r.insert("age".into(), json!(30));
        r.insert("deleted_at".into(), Value::Null);
        r
    }

    #[test]
    fn parses_each_form() {
        assert_eq!(Condition::parse("email IS NOT NULL"), Condition::IsNotNull("email".into()));
        assert_eq!(Condition::parse("  email is null "), Condition::IsNull("email".into()));
        assert_eq!(
            Condition::parse("status = 'active'"),
            Condition::Equals { field: "status".into(), literal: "active".into() }
        );
        assert_eq!(
            Condition::parse("status=\"active\""),
            Condition::Equals { field: "status".into(), literal: "active".into() }
        );
    }

    #[test]
    fn unrecognized_is_always_true() {
        for expr in ["", "age > 18", "a = b = c", "first name = 'x'", "IS NULL"] {
            assert_eq!(Condition::parse(expr), Condition::Always, "{expr}");
            assert!(evaluate(expr, &record()));
        }
    }

    #[test]
    fn null_checks_treat_null_as_missing() {
        let r = record();
        assert!(evaluate("email IS NOT NULL", &r));
        assert!(!evaluate("email IS NULL", &r));
        assert!(evaluate("deleted_at IS NULL", &r));
        assert!(evaluate("phone IS NULL", &r));
        assert!(!evaluate("phone IS NOT NULL", &r));
    }

    #[test]
    fn equality_compares_rendered_values() {
        let r = record();
        assert!(evaluate("status = 'active'", &r));
        assert!(!evaluate("status = 'inactive'", &r));
        assert!(evaluate("age = 30", &r));
        assert!(!evaluate("missing = ''", &r));
    }

    #[test]
    fn display_round_trips() {
        for expr in ["email IS NULL", "email IS NOT NULL", "status = 'active'"] {
            assert_eq!(Condition::parse(expr).to_string(), expr);
        }
    }
}
