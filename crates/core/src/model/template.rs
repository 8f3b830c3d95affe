use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::default_true;

/// Free-form key/value configuration attached to templates and bindings.
pub type ConfigMap = Map<String, Value>;

/// Which engine mode a template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Quality,
    Masking,
    Cleansing,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKind::Quality => write!(f, "quality"),
            TemplateKind::Masking => write!(f, "masking"),
            TemplateKind::Cleansing => write!(f, "cleansing"),
        }
    }
}

impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "quality" => Ok(TemplateKind::Quality),
            "masking" => Ok(TemplateKind::Masking),
            "cleansing" => Ok(TemplateKind::Cleansing),
            other => Err(format!("unknown template kind: '{}'", other)),
        }
    }
}

/// Reusable definition of one check or transform.
///
/// `rule_type` selects the built-in behavior within `kind` (e.g.
/// `completeness`, `mask`, `standardization`); `rule_logic` and
/// `default_config` parameterize it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTemplate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: TemplateKind,
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub rule_logic: ConfigMap,
    /// Parameter descriptions for UIs; not read by the engine.
    #[serde(default)]
    pub parameters: ConfigMap,
    #[serde(default)]
    pub default_config: ConfigMap,
    #[serde(default)]
    pub is_built_in: bool,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl RuleTemplate {
    pub fn new(id: impl Into<String>, kind: TemplateKind, rule_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: None,
            kind,
            rule_type: rule_type.into(),
            category: None,
            rule_logic: ConfigMap::new(),
            parameters: ConfigMap::new(),
            default_config: ConfigMap::new(),
            is_built_in: false,
            is_enabled: true,
            version: default_version(),
            created_at: None,
        }
    }

    /// Builder-style helper to set one `rule_logic` key.
    pub fn with_logic(mut self, key: &str, value: Value) -> Self {
        self.rule_logic.insert(key.to_string(), value);
        self
    }
}
