use std::collections::HashSet;

use chrono::TimeZone;
use serde_json::{json, Value};
use steward_core::ConfigMap;

use super::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
}

fn config(value: Value) -> EffectiveConfig {
    let map: ConfigMap = serde_json::from_value(value).unwrap();
    EffectiveConfig::from_layers([&map])
}

fn check(rule_type: &str, value: Value, cfg: Value) -> CheckResult {
    check_in(rule_type, value, cfg, &Record::new(), None)
}

fn check_in(
    rule_type: &str,
    value: Value,
    cfg: Value,
    record: &Record,
    seen: Option<&HashSet<String>>,
) -> CheckResult {
    let cfg = config(cfg);
    let input = CheckInput {
        field: "f",
        value: &value,
        record,
        config: &cfg,
        now: now(),
        seen,
    };
    run_check(rule_type, &input)
}

// ── Completeness ────────────────────────────────────────────────────

#[test]
fn completeness_empty_string_respects_flag() {
    let err = check("completeness", json!(""), json!({})).unwrap_err();
    assert!(err.contains("empty string"), "{err}");
    assert!(check("completeness", json!(""), json!({"check_empty_string": false})).is_ok());
}

#[test]
fn completeness_zero_respects_allow_zero() {
    let err = check("completeness", json!(0), json!({"allow_zero": false})).unwrap_err();
    assert!(err.contains("zero is not allowed"), "{err}");
    assert!(check("completeness", json!(0.0), json!({"allow_zero": false})).is_err());
    assert!(check("completeness", json!(0), json!({})).is_ok());
    assert!(check("completeness", json!(0), json!({"allow_zero": true})).is_ok());
}

#[test]
fn completeness_null_whitespace_and_length() {
    assert!(check("completeness", Value::Null, json!({}))
        .unwrap_err()
        .contains("is null"));
    assert!(check("completeness", Value::Null, json!({"check_null": false})).is_ok());
    assert!(check("completeness", json!("   "), json!({}))
        .unwrap_err()
        .contains("whitespace"));
    assert!(check("completeness", json!("   "), json!({"check_whitespace_only": false})).is_ok());
    assert!(check("completeness", json!("ab"), json!({"min_length": 3})).is_err());
    assert!(check("completeness", json!("张三丰"), json!({"min_length": 3})).is_ok());
}

// ── Accuracy ────────────────────────────────────────────────────────

#[test]
fn accuracy_email_regex() {
    let cfg = json!({"validation_type": "email", "regex_pattern": r"^[\w.-]+@[\w.-]+\.[a-zA-Z]{2,}$"});
    assert!(check("accuracy", json!("bad"), cfg.clone()).is_err());
    assert!(check("accuracy", json!("user@example.com"), cfg).is_ok());
}

#[test]
fn accuracy_numeric_range() {
    let cfg = json!({"min_value": 0, "max_value": 150});
    assert!(check("accuracy", json!(42), cfg.clone()).is_ok());
    assert!(check("accuracy", json!(-1), cfg.clone()).unwrap_err().contains("below"));
    assert!(check("accuracy", json!(151.5), cfg).unwrap_err().contains("above"));
}

#[test]
fn accuracy_invalid_regex_is_an_issue() {
    let err = check("accuracy", json!("x"), json!({"regex_pattern": "(unclosed"})).unwrap_err();
    assert!(err.contains("invalid regex pattern"), "{err}");
}

// ── Consistency ─────────────────────────────────────────────────────

#[test]
fn consistency_against_related_field() {
    let mut record = Record::new();
    record.insert("confirm".into(), json!("abc"));
    let cfg = json!({"related_field": "confirm"});
    assert!(check_in("consistency", json!("abc"), cfg.clone(), &record, None).is_ok());
    assert!(check_in("consistency", json!("abd"), cfg, &record, None).is_err());

    let differ = json!({"related_field": "confirm", "comparison": "not_equals"});
    assert!(check_in("consistency", json!("abc"), differ, &record, None).is_err());

    let missing = json!({"related_field": "nope"});
    assert!(check_in("consistency", json!("abc"), missing, &record, None)
        .unwrap_err()
        .contains("missing"));
}

#[test]
fn consistency_formats() {
    assert!(check("consistency", json!("13812345678"), json!({"format": "phone"})).is_ok());
    assert!(check("consistency", json!("02012345678"), json!({"format": "phone"})).is_err());
    assert!(check("consistency", json!("a@b"), json!({"format": "email"})).is_err());
}

// ── Validity ────────────────────────────────────────────────────────

#[test]
fn validity_allowed_values() {
    let cfg = json!({"allowed_values": ["active", "inactive", 1]});
    assert!(check("validity", json!("active"), cfg.clone()).is_ok());
    assert!(check("validity", json!(1), cfg.clone()).is_ok());
    assert!(check("validity", json!("deleted"), cfg).is_err());
}

#[test]
fn validity_date_format() {
    let cfg = json!({"date_format": "%Y-%m-%d"});
    assert!(check("validity", json!("2024-02-29"), cfg.clone()).is_ok());
    assert!(check("validity", json!("2023-02-29"), cfg.clone()).is_err());
    assert!(check("validity", json!("29/02/2024"), cfg).is_err());
}

#[test]
fn validity_phone_with_international_option() {
    let cfg = json!({"validation_type": "phone", "regex_pattern": r"^1[3-9]\d{9}$"});
    assert!(check("validity", json!("13912345678"), cfg.clone()).is_ok());
    assert!(check("validity", json!("+8613912345678"), cfg).is_err());
    let intl = json!({"validation_type": "phone", "allow_international": true});
    assert!(check("validity", json!("+8613912345678"), intl).is_ok());
}

// ── Uniqueness ──────────────────────────────────────────────────────

#[test]
fn uniqueness_uses_seen_set() {
    let mut seen = HashSet::new();
    assert!(check_in("uniqueness", json!("a"), json!({}), &Record::new(), Some(&seen)).is_ok());
    seen.insert("a".to_string());
    assert!(check_in("uniqueness", json!("a"), json!({}), &Record::new(), Some(&seen)).is_err());
    assert!(check_in("uniqueness", json!("A"), json!({}), &Record::new(), Some(&seen)).is_ok());
    let insensitive = json!({"case_sensitive": false});
    assert!(check_in("uniqueness", json!("A"), insensitive, &Record::new(), Some(&seen)).is_err());
    // no tracking context means nothing to compare against
    assert!(check("uniqueness", json!("a"), json!({})).is_ok());
}

#[test]
fn uniqueness_key_skips_nulls() {
    assert_eq!(uniqueness_key(&Value::Null, &config(json!({}))), None);
    assert_eq!(
        uniqueness_key(&Value::Null, &config(json!({"ignore_null": false}))),
        Some("null".to_string())
    );
}

// ── Timeliness ──────────────────────────────────────────────────────

#[test]
fn timeliness_max_age() {
    let cfg = json!({"max_age_days": 30});
    assert!(check("timeliness", json!("2024-06-15"), cfg.clone()).is_ok());
    assert!(check("timeliness", json!("2024-06-15 08:30:00"), cfg.clone()).is_ok());
    assert!(check("timeliness", json!("2024-06-01T00:00:00Z"), cfg.clone()).is_ok());
    let err = check("timeliness", json!("2024-01-01"), cfg.clone()).unwrap_err();
    assert!(err.contains("days old"), "{err}");
    let err = check("timeliness", json!("yesterday"), cfg).unwrap_err();
    assert!(err.contains("cannot be parsed"), "{err}");
}

// ── Standardization ─────────────────────────────────────────────────

#[test]
fn standardization_formats() {
    assert!(check("standardization", json!("abc"), json!({"standard_format": "lowercase"})).is_ok());
    assert!(check("standardization", json!("aBc"), json!({"standard_format": "lowercase"})).is_err());
    assert!(check("standardization", json!("ABC"), json!({"standard_format": "uppercase"})).is_ok());
    assert!(check("standardization", json!("Hello World"), json!({"standard_format": "title_case"})).is_ok());
    assert!(check("standardization", json!("hello world"), json!({"standard_format": "title_case"})).is_err());
    assert!(check("standardization", json!(" abc"), json!({"trim_spaces": true})).is_err());
}

#[test]
fn unknown_type_is_an_issue() {
    let err = check("freshness", json!("x"), json!({})).unwrap_err();
    assert!(err.contains("unknown quality rule type"), "{err}");
}
