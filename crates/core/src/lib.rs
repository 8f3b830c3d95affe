//! Shared data model for the quality governance engine.
//!
//! Rule templates, field bindings, quality tasks, executions and issue
//! records live here together with the schedule arithmetic that both the
//! coordinator and the executor rely on.

pub mod config;
pub mod error;
pub mod model;
pub mod record;
pub mod schedule;

pub use config::Config;
pub use error::*;
pub use model::*;
pub use record::{Record, RecordIdentifier};
pub use schedule::{calculate_next_execution, ScheduleConfig, ScheduleType};
