//! Structural validation of templates, bindings and tasks.
//!
//! Returns a [`ValidationResult`] with errors (reject on save) and warnings
//! (advisory). Nothing here touches record data.

pub(crate) mod fuzzy;


use serde::{Deserialize, Serialize};
use serde_json::Value;
use steward_core::{FieldRuleBinding, QualityTask, RuleTemplate, ScheduleType, TemplateKind};

use crate::cleansing::CleansingType;
use crate::condition::Condition;
use crate::config::EffectiveConfig;
use crate::engine::TemplateMap;
use crate::masking::{MaskPattern, MaskingType};
use crate::quality::QualityRuleType;
use crate::text::compile;

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A blocking validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Location within the document, e.g. `"rule_logic.regex_pattern"`.
    pub path: String,
    pub message: String,
    /// Optional "did you mean" suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// A non-blocking advisory warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    pub(crate) fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.push_error(path.into(), message.into(), None);
    }

    pub(crate) fn error_with_suggestion(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: Option<&str>,
    ) {
        self.push_error(path.into(), message.into(), suggestion.map(str::to_string));
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }

    fn push_error(&mut self, path: String, message: String, suggestion: Option<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path,
            message,
            suggestion,
        });
    }

    /// All error messages joined, for logging and error variants.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| match &e.suggestion {
                Some(s) => format!("{}: {} (did you mean '{}'?)", e.path, e.message, s),
                None => format!("{}: {}", e.path, e.message),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

const REGEX_KEYS: [&str; 2] = ["regex_pattern", "validation_pattern"];

const COUNT_KEYS: [&str; 6] = [
    "keep_start",
    "keep_end",
    "keep_username_chars",
    "min_length",
    "precision",
    "max_age_days",
];

// ── Public API ──────────────────────────────────────────────────────

/// Validate a rule template before it is stored.
pub fn validate_template(template: &RuleTemplate) -> ValidationResult {
    let mut result = ValidationResult::new();

    if template.id.trim().is_empty() {
        result.error("id", "template id must not be empty");
    }
    if !template.is_enabled {
        result.warn("is_enabled", "template is disabled; bindings to it will fail");
    }

    check_rule_type(template, &mut result);

    let config = EffectiveConfig::from_layers([&template.default_config, &template.rule_logic]);
    for key in REGEX_KEYS {
        if let Some(pattern) = config.str(key) {
            if let Err(e) = compile(pattern) {
                result.error(format!("rule_logic.{}", key), e);
            }
        }
    }
    for key in COUNT_KEYS {
        if let Some(value) = config.get(key) {
            if !is_count(value) {
                result.error(
                    format!("rule_logic.{}", key),
                    format!("expected a non-negative number, got {}", value),
                );
            }
        }
    }

    if template.kind == TemplateKind::Masking && template.rule_type == MaskingType::Mask.as_str() {
        if let Err(e) = MaskPattern::from_config(&config) {
            result.error("rule_logic.pattern", e);
        }
    }
    if template.kind == TemplateKind::Quality
        && template.rule_type == QualityRuleType::Timeliness.as_str()
        && !config.contains("max_age_days")
    {
        result.warn("rule_logic.max_age_days", "timeliness check without max_age_days only checks parsing");
    }

    result
}

/// Validate a binding against the templates it may reference.
pub fn validate_binding(binding: &FieldRuleBinding, templates: &TemplateMap) -> ValidationResult {
    let mut result = ValidationResult::new();

    if binding.field_name.trim().is_empty() {
        result.error("field_name", "field name must not be empty");
    }
    if binding.extra_fields.iter().any(|f| f.trim().is_empty()) {
        result.error("extra_fields", "extra field names must not be empty");
    }

    if !templates.contains_key(&binding.rule_template_id) {
        let ids: Vec<&str> = templates.keys().map(String::as_str).collect();
        result.error_with_suggestion(
            "rule_template_id",
            format!("rule template '{}' does not exist", binding.rule_template_id),
            fuzzy::fuzzy_match(&binding.rule_template_id, &ids),
        );
    }

    for (path, cond) in [
        ("pre_condition", &binding.pre_condition),
        ("post_condition", &binding.post_condition),
    ] {
        if let Some(expr) = cond.as_deref().filter(|c| !c.trim().is_empty()) {
            if Condition::parse(expr) == Condition::Always {
                result.warn(path, format!("condition '{}' is not recognised and always holds", expr));
            }
        }
    }

    result
}

/// Validate a task's target and schedule.
pub fn validate_task(task: &QualityTask) -> ValidationResult {
    let mut result = ValidationResult::new();

    if task.target_table.trim().is_empty() {
        result.error("target_table", "target table must not be empty");
    }
    if let Err(e) = task.schedule.validate() {
        result.error("schedule", e.to_string());
    }
    if task.schedule.schedule_type == ScheduleType::Once && task.schedule.scheduled_time.is_none() {
        result.warn("schedule.scheduled_time", "once schedule without a time never fires");
    }

    result
}

// ── Helpers ─────────────────────────────────────────────────────────

fn check_rule_type(template: &RuleTemplate, result: &mut ValidationResult) {
    let known: Vec<&str> = match template.kind {
        TemplateKind::Quality => QualityRuleType::ALL.iter().map(|t| t.as_str()).collect(),
        TemplateKind::Masking => MaskingType::ALL.iter().map(|t| t.as_str()).collect(),
        TemplateKind::Cleansing => CleansingType::ALL.iter().map(|t| t.as_str()).collect(),
    };
    if !known.contains(&template.rule_type.as_str()) {
        result.error_with_suggestion(
            "type",
            format!("unknown {} rule type '{}'", template.kind, template.rule_type),
            fuzzy::fuzzy_match(&template.rule_type, &known),
        );
    }
}

fn is_count(value: &Value) -> bool {
    value.as_u64().is_some() || value.as_f64().is_some_and(|n| n >= 0.0)
}
