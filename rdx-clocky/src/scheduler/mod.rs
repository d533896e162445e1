//! The scheduling facility a `Clock` arms its callbacks on.
//!
//! The clock never touches a timer primitive directly. It asks a `Scheduler`
//! to run a task once after a delay or repeatedly at a fixed period, keeps the
//! returned `ScheduleId`, and cancels it when the schedule is superseded.
//!
//! Two implementations are provided:
//! - [`TokioScheduler`] spawns Tokio tasks and is what applications use.
//! - [`ManualScheduler`] keeps virtual time that only moves when told to,
//!   which makes clock behavior fully deterministic in tests and simulations.

use crate::common::ScheduleId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub mod manual;
pub mod runtime;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

/// A callback armed on a scheduler.
pub type ScheduledTask = Arc<dyn Fn() + Send + Sync>;

/// Schedules callbacks and reports the current time.
///
/// Implementations must not hold any internal lock while a task runs: tasks
/// routinely call back into the scheduler to cancel or arm other schedules.
pub trait Scheduler: Send + Sync {
    /// Runs `task` every `period` until cancelled. The first run happens one
    /// full period after arming.
    fn schedule_repeating(&self, period: Duration, task: ScheduledTask) -> ScheduleId;

    /// Runs `task` once after `delay` unless cancelled first.
    fn schedule_once(&self, delay: Duration, task: ScheduledTask) -> ScheduleId;

    /// Cancels a schedule. Cancelling an unknown, fired or already cancelled
    /// id is a no-op.
    fn cancel(&self, id: ScheduleId);

    /// The monotonic time used for elapsed-time accounting.
    fn now(&self) -> Instant;

    /// The wall-clock time reported to event consumers.
    fn timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
