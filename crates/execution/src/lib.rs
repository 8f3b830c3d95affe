//! Task execution for the quality governance engine.
//!
//! This crate provides:
//! - The [`TaskStore`], [`TemplateStore`] and [`TableScanner`] ports
//! - In-memory stores and scanners, plus a JSON-lines file scanner
//! - YAML workspace fixtures that populate the memory stores
//! - [`TaskExecutionService`], which runs one quality check pass over a table

pub mod error;
pub mod memory;
pub mod ports;
pub mod scan;
pub mod service;
pub mod workspace;

pub use error::{ExecutionError, Result, ScanError, StoreError};
pub use memory::{MemoryTaskStore, MemoryTemplateStore};
pub use ports::{ColumnInfo, RowStream, StoreResult, TableScanner, TaskStore, TaskUpdate, TemplateStore};
pub use scan::{JsonLinesScanner, MemoryTableScanner};
pub use service::TaskExecutionService;
pub use workspace::{Stores, Workspace};
