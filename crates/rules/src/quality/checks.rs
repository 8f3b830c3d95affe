use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use steward_core::record::display_value;

use super::{uniqueness_key, CheckInput, CheckResult};
use crate::text::{compile, title_case, KnownFormat};

// ── Completeness ────────────────────────────────────────────────────

pub(super) fn completeness(input: &CheckInput<'_>) -> CheckResult {
    let (field, cfg) = (input.field, input.config);
    let issue = |reason: String| format!("field {} completeness check failed: {}", field, reason);

    if input.value.is_null() && cfg.bool_or("check_null", true) {
        return Err(issue("field is null".to_string()));
    }

    if let Value::String(s) = input.value {
        if s.is_empty() && cfg.bool_or("check_empty_string", true) {
            return Err(issue("field is an empty string".to_string()));
        }
        if !s.is_empty() && s.trim().is_empty() && cfg.bool_or("check_whitespace_only", true) {
            return Err(issue("field contains only whitespace".to_string()));
        }
        if let Some(min) = cfg.usize("min_length") {
            let len = s.chars().count();
            if len < min {
                return Err(issue(format!(
                    "length {} is shorter than the required {} characters",
                    len, min
                )));
            }
        }
    }

    if !cfg.bool_or("allow_zero", true) && input.value.as_f64() == Some(0.0) {
        return Err(issue("zero is not allowed".to_string()));
    }

    Ok(())
}

// ── Accuracy ────────────────────────────────────────────────────────

pub(super) fn accuracy(input: &CheckInput<'_>) -> CheckResult {
    let (field, cfg) = (input.field, input.config);
    let issue = |reason: String| format!("field {} accuracy check failed: {}", field, reason);

    if let Some(n) = input.value.as_f64() {
        if let Some(min) = cfg.f64("min_value") {
            if n < min {
                return Err(issue(format!("value {} is below the minimum {}", n, min)));
            }
        }
        if let Some(max) = cfg.f64("max_value") {
            if n > max {
                return Err(issue(format!("value {} is above the maximum {}", n, max)));
            }
        }
    }

    if let Value::String(s) = input.value {
        if let Some(pattern) = cfg.str("regex_pattern") {
            let re = compile(pattern).map_err(issue)?;
            if !re.is_match(s) {
                return Err(issue(format!("value '{}' does not match pattern '{}'", s, pattern)));
            }
        }
        if cfg.str("validation_type") == Some("email") && !KnownFormat::Email.is_match(s) {
            return Err(issue(format!("value '{}' is not a valid email address", s)));
        }
    }

    Ok(())
}

// ── Consistency ─────────────────────────────────────────────────────

pub(super) fn consistency(input: &CheckInput<'_>) -> CheckResult {
    let (field, cfg) = (input.field, input.config);
    let issue = |reason: String| format!("field {} consistency check failed: {}", field, reason);

    if let Some(related) = cfg.str("related_field") {
        let Some(other) = input.record.get(related) else {
            return Err(issue(format!("related field '{}' is missing", related)));
        };
        let (mine, theirs) = (display_value(input.value), display_value(other));
        match cfg.str_or("comparison", "equals") {
            "not_equals" if mine == theirs => {
                return Err(issue(format!(
                    "value '{}' must differ from related field '{}'",
                    mine, related
                )));
            }
            "equals" if mine != theirs => {
                return Err(issue(format!(
                    "value '{}' does not match related field '{}' value '{}'",
                    mine, related, theirs
                )));
            }
            _ => {}
        }
    }

    if let Value::String(s) = input.value {
        match cfg.str("format") {
            Some("email") if !KnownFormat::StrictEmail.is_match(s) => {
                return Err(issue(format!("value '{}' is not a valid email address", s)));
            }
            Some("phone") if !KnownFormat::Mobile.is_match(s) => {
                return Err(issue(format!("value '{}' is not a valid phone number", s)));
            }
            _ => {}
        }
    }

    Ok(())
}

// ── Validity ────────────────────────────────────────────────────────

pub(super) fn validity(input: &CheckInput<'_>) -> CheckResult {
    let (field, cfg) = (input.field, input.config);
    let issue = |reason: String| format!("field {} validity check failed: {}", field, reason);

    if let Some(allowed) = cfg.array("allowed_values") {
        let rendered = display_value(input.value);
        if !allowed.iter().any(|a| a == input.value || display_value(a) == rendered) {
            return Err(issue(format!("value '{}' is not in the allowed values", rendered)));
        }
    }

    let Value::String(s) = input.value else {
        return Ok(());
    };

    if let Some(format) = cfg.str("date_format") {
        let parses = NaiveDateTime::parse_from_str(s, format).is_ok()
            || NaiveDate::parse_from_str(s, format).is_ok();
        if !parses {
            return Err(issue(format!("value '{}' does not match date format '{}'", s, format)));
        }
    }

    if cfg.str("validation_type") == Some("phone") {
        let international = cfg.bool_or("allow_international", false)
            && KnownFormat::InternationalPhone.is_match(s);
        if !KnownFormat::Mobile.is_match(s) && !international {
            return Err(issue(format!("value '{}' is not a valid phone number", s)));
        }
        return Ok(());
    }

    if let Some(pattern) = cfg.str("regex_pattern") {
        let re = compile(pattern).map_err(issue)?;
        if !re.is_match(s) {
            return Err(issue(format!("value '{}' does not match pattern '{}'", s, pattern)));
        }
    }

    Ok(())
}

// ── Uniqueness ──────────────────────────────────────────────────────

pub(super) fn uniqueness(input: &CheckInput<'_>) -> CheckResult {
    let (Some(seen), Some(key)) = (input.seen, uniqueness_key(input.value, input.config)) else {
        return Ok(());
    };
    if seen.contains(&key) {
        return Err(format!(
            "field {} uniqueness check failed: duplicate value '{}'",
            input.field,
            display_value(input.value)
        ));
    }
    Ok(())
}

// ── Timeliness ──────────────────────────────────────────────────────

const TIMESTAMP_FORMATS: [&str; 1] = ["%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: [&str; 1] = ["%Y-%m-%d"];

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

pub(super) fn timeliness(input: &CheckInput<'_>) -> CheckResult {
    let (field, cfg) = (input.field, input.config);
    let (Some(max_age), Value::String(s)) = (cfg.f64("max_age_days"), input.value) else {
        return Ok(());
    };

    let Some(ts) = parse_timestamp(s) else {
        return Err(format!(
            "field {} timeliness check failed: value '{}' cannot be parsed as a date",
            field, s
        ));
    };

    let age_days = (input.now - ts).num_seconds() as f64 / 86_400.0;
    if age_days > max_age {
        return Err(format!(
            "field {} timeliness check failed: data is {:.1} days old, exceeding the maximum of {} days",
            field, age_days, max_age
        ));
    }
    Ok(())
}

// ── Standardization ─────────────────────────────────────────────────

pub(super) fn standardization(input: &CheckInput<'_>) -> CheckResult {
    let (field, cfg) = (input.field, input.config);
    let Value::String(s) = input.value else {
        return Ok(());
    };
    let issue = |reason: String| format!("field {} standardization check failed: {}", field, reason);

    if cfg.bool_or("trim_spaces", false) && s.trim() != s {
        return Err(issue(format!("value '{}' has leading or trailing whitespace", s)));
    }

    let expected = match cfg.str("standard_format") {
        Some("uppercase") => s.to_uppercase(),
        Some("lowercase") => s.to_lowercase(),
        Some("title_case") => title_case(s),
        _ => return Ok(()),
    };
    if *s != expected {
        return Err(issue(format!(
            "value '{}' is not in {} format",
            s,
            cfg.str_or("standard_format", "")
        )));
    }
    Ok(())
}
