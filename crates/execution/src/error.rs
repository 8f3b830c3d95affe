//! Error types for stores, scanners and executions.

use steward_rules::RuleError;

/// Errors raised by [`TaskStore`](crate::TaskStore) and
/// [`TemplateStore`](crate::TemplateStore) implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Write refused, e.g. overwriting a built-in template.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend unreachable or failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Errors raised by [`TableScanner`](crate::TableScanner) implementations.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("table {schema}.{table} not found")]
    TableNotFound { schema: String, table: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A row could not be decoded into a record.
    #[error("row {line}: {reason}")]
    Decode { line: usize, reason: String },
}

/// Errors that abort one execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result alias for execution operations.
pub type Result<T> = std::result::Result<T, ExecutionError>;
