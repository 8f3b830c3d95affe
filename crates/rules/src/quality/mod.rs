//! Quality checks.
//!
//! Each check inspects one field value under an [`EffectiveConfig`] and
//! either passes or returns one issue string. Checks never mutate the
//! record.

mod checks;
#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;
use steward_core::record::display_value;
use steward_core::Record;

use crate::config::EffectiveConfig;
use crate::error::RuleError;

/// Outcome of one check: `Err` carries the issue text.
pub type CheckResult = std::result::Result<(), String>;

/// Built-in quality rule kinds, selected by the template's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityRuleType {
    Completeness,
    Accuracy,
    Consistency,
    Validity,
    Uniqueness,
    Timeliness,
    Standardization,
}

impl QualityRuleType {
    pub const ALL: [QualityRuleType; 7] = [
        QualityRuleType::Completeness,
        QualityRuleType::Accuracy,
        QualityRuleType::Consistency,
        QualityRuleType::Validity,
        QualityRuleType::Uniqueness,
        QualityRuleType::Timeliness,
        QualityRuleType::Standardization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityRuleType::Completeness => "completeness",
            QualityRuleType::Accuracy => "accuracy",
            QualityRuleType::Consistency => "consistency",
            QualityRuleType::Validity => "validity",
            QualityRuleType::Uniqueness => "uniqueness",
            QualityRuleType::Timeliness => "timeliness",
            QualityRuleType::Standardization => "standardization",
        }
    }
}

impl fmt::Display for QualityRuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityRuleType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualityRuleType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| RuleError::UnknownType {
                kind: "quality".to_string(),
                rule_type: s.to_string(),
            })
    }
}

/// Everything a check may look at.
pub struct CheckInput<'a> {
    pub field: &'a str,
    pub value: &'a Value,
    pub record: &'a Record,
    pub config: &'a EffectiveConfig,
    /// Reference time for age-based checks.
    pub now: DateTime<Utc>,
    /// Values already seen for this binding and field earlier in the run.
    pub seen: Option<&'a HashSet<String>>,
}

/// Run the check selected by `rule_type`.
pub fn run_check(rule_type: &str, input: &CheckInput<'_>) -> CheckResult {
    let Ok(kind) = rule_type.parse::<QualityRuleType>() else {
        return Err(format!(
            "field {} check failed: unknown quality rule type '{}'",
            input.field, rule_type
        ));
    };
    match kind {
        QualityRuleType::Completeness => checks::completeness(input),
        QualityRuleType::Accuracy => checks::accuracy(input),
        QualityRuleType::Consistency => checks::consistency(input),
        QualityRuleType::Validity => checks::validity(input),
        QualityRuleType::Uniqueness => checks::uniqueness(input),
        QualityRuleType::Timeliness => checks::timeliness(input),
        QualityRuleType::Standardization => checks::standardization(input),
    }
}

/// Key under which a value is remembered for uniqueness tracking.
///
/// `None` means the value is exempt (null with `ignore_null`, the default).
pub fn uniqueness_key(value: &Value, config: &EffectiveConfig) -> Option<String> {
    if value.is_null() && config.bool_or("ignore_null", true) {
        return None;
    }
    let rendered = display_value(value);
    if config.bool_or("case_sensitive", true) {
        Some(rendered)
    } else {
        Some(rendered.to_lowercase())
    }
}
