//! A `Scheduler` backed by Tokio tasks and timers.

use super::{ScheduledTask, Scheduler};
use crate::common::ScheduleId;
use crate::error::{ClockError, Result};
use parking_lot::Mutex;
use slotmap::SlotMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::trace;

// `interval_at` panics on a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Runs each schedule as its own Tokio task.
///
/// Repeating schedules drive an `interval_at` ticker; one-shot schedules sleep
/// and then run. Cancelling aborts the task. The scheduler is cheap to clone
/// and every clone shares the same set of live tasks.
#[derive(Clone)]
pub struct TokioScheduler {
    runtime: Handle,
    tasks: Arc<Mutex<SlotMap<ScheduleId, AbortHandle>>>,
}

impl TokioScheduler {
    /// Creates a scheduler that spawns onto the given runtime.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Arc::new(Mutex::new(SlotMap::with_key())),
        }
    }

    /// Creates a scheduler that spawns onto the runtime of the calling context.
    pub fn current() -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| ClockError::NoRuntime(e.to_string()))?;
        Ok(Self::new(runtime))
    }

    /// The number of schedules that are armed and not yet finished.
    pub fn active_schedules(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, period: Duration, task: ScheduledTask) -> ScheduleId {
        let period = period.max(MIN_PERIOD);
        let first = Instant::now() + period;
        let mut tasks = self.tasks.lock();
        tasks.insert_with_key(|id| {
            trace!("Arming repeating schedule {:?} every {:?}.", id, period);
            self.runtime
                .spawn(async move {
                    let mut ticker = interval_at(first, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
                    loop {
                        ticker.tick().await;
                        (task)();
                    }
                })
                .abort_handle()
        })
    }

    fn schedule_once(&self, delay: Duration, task: ScheduledTask) -> ScheduleId {
        let deadline = Instant::now() + delay;
        let mut tasks = self.tasks.lock();
        let registry = Arc::clone(&self.tasks);
        tasks.insert_with_key(|id| {
            trace!("Arming one-shot schedule {:?} after {:?}.", id, delay);
            self.runtime
                .spawn(async move {
                    sleep_until(deadline).await;
                    (task)();
                    registry.lock().remove(id);
                })
                .abort_handle()
        })
    }

    fn cancel(&self, id: ScheduleId) {
        if let Some(handle) = self.tasks.lock().remove(id) {
            trace!("Cancelling schedule {:?}.", id);
            handle.abort();
        }
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
