//! Error types for rule evaluation.

/// Errors raised while applying a single rule to a single field.
///
/// The engine converts these into issue strings; they never abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Masking could not be applied (unknown pattern, malformed input).
    #[error("field {field} masking failed: {reason}")]
    Masking { field: String, reason: String },

    /// Cleansing could not be applied (e.g. validation failed with no default).
    #[error("field {field} cleansing failed: {reason}")]
    Cleansing { field: String, reason: String },

    /// Template type tag not known for its kind.
    #[error("unknown {kind} rule type: '{rule_type}'")]
    UnknownType { kind: String, rule_type: String },

    /// Template failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Built-in catalog could not be parsed.
    #[error("yaml parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
