use serde_json::{json, Value};
use steward_core::ConfigMap;

use super::*;

fn config(value: Value) -> EffectiveConfig {
    let map: ConfigMap = serde_json::from_value(value).unwrap();
    EffectiveConfig::from_layers([&map])
}

fn mask(value: &str, cfg: Value) -> Result<String> {
    mask_value("f", value, &config(cfg))
}

// ── Pattern families ────────────────────────────────────────────────

#[test]
fn id_card_eighteen_and_fifteen() {
    let cfg = json!({"pattern": "id_card", "mask_char": "*"});
    assert_eq!(mask("110101199001011234", cfg.clone()).unwrap(), "110101********1234");
    assert_eq!(mask("330602199512155678", cfg.clone()).unwrap(), "330602********5678");
    assert_eq!(mask("11010119900101123X", cfg.clone()).unwrap(), "110101********123X");
    assert_eq!(mask("110101900101123", cfg.clone()).unwrap(), "110101******123");
    assert_eq!(mask("330602951215456", cfg).unwrap(), "330602******456");
}

#[test]
fn id_card_wrong_length_names_field() {
    let err = mask_value("id_no", "12345678901", &config(json!({"pattern": "id_card"}))).unwrap_err();
    assert!(matches!(&err, RuleError::Masking { field, .. } if field == "id_no"));
    assert!(err.to_string().contains("15 or 18"), "{err}");
}

#[test]
fn bank_card_plain_and_grouped() {
    let plain = json!({"pattern": "bank_card", "mask_char": "*", "group_format": false});
    assert_eq!(mask("6222021234567890", plain).unwrap(), "622202******7890");

    let grouped = json!({"pattern": "bank_card", "mask_char": "*", "group_format": true});
    assert_eq!(mask("6222021234567890", grouped.clone()).unwrap(), "6222 02** **** 7890");
    assert_eq!(mask("6217001234567891234", grouped.clone()).unwrap(), "6217 00** **** ***1 234");
    assert!(mask("12345", grouped).is_err());
}

#[test]
fn personal_names() {
    let cfg = json!({"pattern": "chinese_name", "mask_char": "*"});
    assert_eq!(mask("李", cfg.clone()).unwrap(), "李");
    assert_eq!(mask("张三", cfg.clone()).unwrap(), "张*");
    assert_eq!(mask("王明华", cfg.clone()).unwrap(), "王*华");
    assert_eq!(mask("欧阳明芳", cfg).unwrap(), "欧**芳");
    assert_eq!(mask("Alice", json!({"pattern": "name"})).unwrap(), "A***e");
}

#[test]
fn emails_keep_username_prefix() {
    let cfg = json!({"pattern": "email", "keep_username_chars": 2});
    assert_eq!(mask("zhang@163.com", cfg.clone()).unwrap(), "zh***@163.com");
    assert_eq!(mask("wangming@gmail.com", cfg.clone()).unwrap(), "wa******@gmail.com");
    assert_eq!(mask("li@qq.com", cfg.clone()).unwrap(), "li*@qq.com");
    assert!(mask("not-an-email", cfg).is_err());
}

#[test]
fn generic_keep_start_and_end() {
    let cfg = json!({"keep_start": 3, "keep_end": 4, "mask_char": "#"});
    assert_eq!(mask("13812345678", cfg.clone()).unwrap(), "138####5678");
    assert_eq!(mask("123456", cfg).unwrap(), "######");
    assert_eq!(mask("", json!({})).unwrap(), "");
    assert_eq!(mask("13812345678", json!({"pattern": "phone"})).unwrap(), "138****5678");
}

#[test]
fn oversized_keep_counts_mask_everything() {
    let cfg = json!({"keep_start": 1e30, "keep_end": 4, "mask_char": "*"});
    assert_eq!(mask("1234567890", cfg).unwrap(), "**********");
    let cfg = json!({"keep_start": 2, "keep_end": 1e30, "mask_char": "*"});
    assert_eq!(mask("abc", cfg).unwrap(), "***");
}

#[test]
fn unknown_pattern_is_an_error() {
    let err = mask("x", json!({"pattern": "passport"})).unwrap_err();
    assert!(err.to_string().contains("unknown mask pattern 'passport'"), "{err}");
}

// ── Other masking types ─────────────────────────────────────────────

#[test]
fn replace_encrypt_pseudonymize() {
    let empty = config(json!({}));
    assert_eq!(apply_masking("replace", "f", &json!("secret"), &empty).unwrap(), json!("***"));
    assert_eq!(
        apply_masking("replace", "f", &json!("secret"), &config(json!({"replacement": "[hidden]"}))).unwrap(),
        json!("[hidden]")
    );
    assert_eq!(apply_masking("encrypt", "f", &json!("ab"), &empty).unwrap(), json!("ENC_6162"));

    let first = pseudonymize_value("张三", &empty);
    assert_eq!(first, pseudonymize_value("张三", &empty));
    assert!(first.starts_with("user_"));
    let user = pseudonymize_value("u-1", &config(json!({"pattern": "user_id"})));
    assert!(user.starts_with("USER_"));
}

#[test]
fn null_stays_null_and_numbers_are_rendered() {
    let cfg = config(json!({"keep_start": 1}));
    assert_eq!(apply_masking("mask", "f", &Value::Null, &cfg).unwrap(), Value::Null);
    assert_eq!(apply_masking("mask", "f", &json!(1234), &cfg).unwrap(), json!("1***"));
}

#[test]
fn unknown_masking_type() {
    let err = apply_masking("shuffle", "f", &json!("x"), &config(json!({}))).unwrap_err();
    assert!(matches!(err, RuleError::Masking { .. }));
}
