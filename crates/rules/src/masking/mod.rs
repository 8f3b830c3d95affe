//! Masking transforms: mask, replace, encrypt, pseudonymize.

mod patterns;
#[cfg(test)]
mod tests;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use sha2::{Digest, Sha256};
use steward_core::record::display_value;

use crate::config::EffectiveConfig;
use crate::error::{Result, RuleError};

pub use patterns::MaskPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskingType {
    Mask,
    Replace,
    Encrypt,
    Pseudonymize,
}

impl MaskingType {
    pub const ALL: [MaskingType; 4] = [
        MaskingType::Mask,
        MaskingType::Replace,
        MaskingType::Encrypt,
        MaskingType::Pseudonymize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaskingType::Mask => "mask",
            MaskingType::Replace => "replace",
            MaskingType::Encrypt => "encrypt",
            MaskingType::Pseudonymize => "pseudonymize",
        }
    }
}

impl fmt::Display for MaskingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaskingType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        MaskingType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| RuleError::UnknownType {
                kind: "masking".to_string(),
                rule_type: s.to_string(),
            })
    }
}

/// Apply the masking selected by `masking_type` to one field value.
///
/// Null stays null. Non-string values are masked through their rendered
/// form and come back as strings.
pub fn apply_masking(
    masking_type: &str,
    field: &str,
    value: &Value,
    config: &EffectiveConfig,
) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let kind = masking_type.parse::<MaskingType>().map_err(|e| RuleError::Masking {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    let text = display_value(value);
    let masked = match kind {
        MaskingType::Mask => mask_value(field, &text, config)?,
        MaskingType::Replace => config.str_or("replacement", "***").to_string(),
        MaskingType::Encrypt => encrypt_value(&text),
        MaskingType::Pseudonymize => pseudonymize_value(&text, config),
    };
    Ok(Value::String(masked))
}

/// Mask `value` using the pattern family named by the `pattern` key.
pub fn mask_value(field: &str, value: &str, config: &EffectiveConfig) -> Result<String> {
    let pattern = MaskPattern::from_config(config).map_err(|reason| RuleError::Masking {
        field: field.to_string(),
        reason,
    })?;
    pattern.apply(value, config).map_err(|reason| RuleError::Masking {
        field: field.to_string(),
        reason,
    })
}

/// Reversible hex encoding with an `ENC_` marker. Not a cipher.
pub fn encrypt_value(value: &str) -> String {
    let mut out = String::with_capacity(4 + value.len() * 2);
    out.push_str("ENC_");
    for byte in value.as_bytes() {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Stable pseudonym derived from a SHA-256 digest of the value.
///
/// `pattern = user_id` yields `USER_<n>` with n below 10000; otherwise
/// `<prefix><n>` with n below 1000 and prefix defaulting to `user_`.
pub fn pseudonymize_value(value: &str, config: &EffectiveConfig) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let bucket = u64::from_be_bytes(head);

    match config.str("pattern") {
        Some("user_id") => format!("USER_{}", bucket % 10_000),
        _ => format!("{}{}", config.str_or("prefix", "user_"), bucket % 1_000),
    }
}
