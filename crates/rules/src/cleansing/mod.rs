//! Cleansing transforms.
//!
//! Every operation takes one field value and returns its replacement.
//! Null values pass through untouched except for enrichment, which exists
//! to fill them.


use std::collections::HashSet;
use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};
use steward_core::record::display_value;

use crate::config::EffectiveConfig;
use crate::error::{Result, RuleError};
use crate::text::{compile, title_case};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleansingType {
    Standardization,
    Deduplication,
    Validation,
    Transformation,
    Enrichment,
}

impl CleansingType {
    pub const ALL: [CleansingType; 5] = [
        CleansingType::Standardization,
        CleansingType::Deduplication,
        CleansingType::Validation,
        CleansingType::Transformation,
        CleansingType::Enrichment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CleansingType::Standardization => "standardization",
            CleansingType::Deduplication => "deduplication",
            CleansingType::Validation => "validation",
            CleansingType::Transformation => "transformation",
            CleansingType::Enrichment => "enrichment",
        }
    }
}

impl fmt::Display for CleansingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleansingType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        CleansingType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| RuleError::UnknownType {
                kind: "cleansing".to_string(),
                rule_type: s.to_string(),
            })
    }
}

/// Apply the cleansing operation selected by `rule_type`.
pub fn apply_cleansing(
    rule_type: &str,
    field: &str,
    value: &Value,
    config: &EffectiveConfig,
) -> Result<Value> {
    let fail = |reason: String| RuleError::Cleansing {
        field: field.to_string(),
        reason,
    };
    let kind = rule_type
        .parse::<CleansingType>()
        .map_err(|e| fail(e.to_string()))?;

    if value.is_null() && kind != CleansingType::Enrichment {
        return Ok(Value::Null);
    }

    match kind {
        CleansingType::Standardization => Ok(standardize(value, config)),
        CleansingType::Deduplication => Ok(deduplicate(value, config)),
        CleansingType::Validation => validate(value, config).map_err(fail),
        CleansingType::Transformation => transform(value, config).map_err(fail),
        CleansingType::Enrichment => Ok(enrich(value, config)),
    }
}

// ── Standardization ─────────────────────────────────────────────────

fn standardize(value: &Value, config: &EffectiveConfig) -> Value {
    let mut s = display_value(value);

    if config.bool_or("trim_spaces", false) {
        s = s.trim().to_string();
    }

    match config.str("standardization_type") {
        Some("email_lowercase") => s = s.to_lowercase(),
        Some("phone_format") => s.retain(|c| c.is_ascii_digit()),
        _ => {}
    }

    match config.str("case") {
        Some("upper") => s = s.to_uppercase(),
        Some("lower") => s = s.to_lowercase(),
        Some("title") => s = title_case(&s),
        _ => {}
    }

    if config.str("format_type") == Some("number") {
        if let (Some(precision), Ok(n)) = (config.usize("precision"), s.trim().parse::<f64>()) {
            s = format!("{:.*}", precision.min(MAX_PRECISION), n);
        }
    }

    Value::String(s)
}

/// Digits beyond this carry no information for an `f64`.
const MAX_PRECISION: usize = 17;

// ── Deduplication ───────────────────────────────────────────────────

fn deduplicate(value: &Value, config: &EffectiveConfig) -> Value {
    if !config.bool_or("remove_duplicate_chars", false) {
        return value.clone();
    }
    let mut seen = HashSet::new();
    let deduped: String = display_value(value)
        .chars()
        .filter(|c| seen.insert(*c))
        .collect();
    Value::String(deduped)
}

// ── Validation ──────────────────────────────────────────────────────

fn validate(value: &Value, config: &EffectiveConfig) -> std::result::Result<Value, String> {
    let Some(pattern) = config.str("validation_pattern") else {
        return Ok(value.clone());
    };
    let re = compile(pattern)?;
    let s = display_value(value);
    if re.is_match(&s) {
        return Ok(value.clone());
    }
    match config.get("default_value") {
        Some(default) => Ok(default.clone()),
        None => Err(format!("value '{}' does not match '{}'", s, pattern)),
    }
}

// ── Transformation ──────────────────────────────────────────────────

fn transform(value: &Value, config: &EffectiveConfig) -> std::result::Result<Value, String> {
    let s = display_value(value);
    match config.str("transform_type") {
        Some("date_format") => {
            let (Some(from), Some(to)) = (config.str("from_format"), config.str("to_format")) else {
                return Ok(value.clone());
            };
            let mut out = String::new();
            let rendered = if let Ok(dt) = NaiveDateTime::parse_from_str(&s, from) {
                write!(out, "{}", dt.format(to))
            } else if let Ok(d) = NaiveDate::parse_from_str(&s, from) {
                write!(out, "{}", d.format(to))
            } else {
                return Ok(value.clone());
            };
            rendered.map_err(|_| format!("cannot render '{}' with format '{}'", s, to))?;
            Ok(Value::String(out))
        }
        Some("number_format") => {
            let Ok(n) = s.trim().parse::<f64>() else {
                return Ok(value.clone());
            };
            let scaled = n * config.f64("multiplier").unwrap_or(1.0);
            Ok(Number::from_f64(scaled).map(Value::Number).unwrap_or_else(|| value.clone()))
        }
        Some("format_conversion") => Ok(match config.str("target_format") {
            Some("uppercase") => Value::String(s.to_uppercase()),
            Some("lowercase") => Value::String(s.to_lowercase()),
            Some("title_case") => Value::String(title_case(&s)),
            _ => value.clone(),
        }),
        _ => Ok(value.clone()),
    }
}

// ── Enrichment ──────────────────────────────────────────────────────

fn enrich(value: &Value, config: &EffectiveConfig) -> Value {
    let empty = value.is_null() || value.as_str() == Some("");
    if empty {
        if let Some(default) = config.get("default_value") {
            return default.clone();
        }
        if value.is_null() {
            return Value::Null;
        }
    }

    let (prefix, suffix) = (config.str("prefix"), config.str("suffix"));
    if prefix.is_none() && suffix.is_none() {
        return value.clone();
    }
    Value::String(format!(
        "{}{}{}",
        prefix.unwrap_or(""),
        display_value(value),
        suffix.unwrap_or("")
    ))
}
