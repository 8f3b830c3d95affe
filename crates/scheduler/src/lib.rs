//! Schedule coordination for the quality governance engine.
//!
//! This crate provides:
//! - [`ScheduleCoordinator`], which fires cron, interval and once tasks
//! - The [`DistributedLock`] port and an in-memory lease table
//! - A [`Clock`] seam for pinning schedule arithmetic in tests

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod lock;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{CoordinatorBuilder, ScheduleCoordinator};
pub use error::{LockError, Result, SchedulerError};
pub use lock::{with_lease, DistributedLock, InMemoryLeaseTable, InMemoryLock};
