//! A `Scheduler` driven by virtual time.
//!
//! Nothing fires until [`ManualScheduler::advance`] is called. Advancing walks
//! the pending schedules in deadline order, moving virtual time to each
//! deadline before running the task, so a task observes `now()` equal to the
//! instant it was due. Schedules due at the same instant run in the order
//! they were first armed; a repeating schedule keeps its original position.

use super::{ScheduledTask, Scheduler};
use crate::common::ScheduleId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use slotmap::SlotMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const MIN_PERIOD: Duration = Duration::from_millis(1);

struct Entry {
    /// Offset from the scheduler's origin.
    deadline: Duration,
    /// `Some` for repeating schedules.
    period: Option<Duration>,
    seq: u64,
    task: ScheduledTask,
}

struct VirtualTime {
    elapsed: Duration,
    next_seq: u64,
    entries: SlotMap<ScheduleId, Entry>,
}

/// Deterministic scheduler for tests and simulations.
///
/// Clones share the same virtual timeline.
#[derive(Clone)]
pub struct ManualScheduler {
    origin: Instant,
    wall_origin: DateTime<Utc>,
    state: Arc<Mutex<VirtualTime>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            wall_origin: Utc::now(),
            state: Arc::new(Mutex::new(VirtualTime {
                elapsed: Duration::ZERO,
                next_seq: 0,
                entries: SlotMap::with_key(),
            })),
        }
    }

    /// Virtual time elapsed since the scheduler was created.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    /// The number of schedules that are armed and not yet finished.
    pub fn pending(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Moves virtual time forward by `by`, running every task that falls due.
    ///
    /// Tasks run with no lock held and may arm or cancel schedules; anything
    /// they arm that falls due before the end of the window also runs.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().elapsed + by;
        while let Some(task) = self.next_due(target) {
            (task)();
        }
    }

    /// Advances by whole milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Pops the earliest schedule due at or before `target`, moving virtual
    /// time to its deadline. Moves time to `target` when nothing is due.
    fn next_due(&self, target: Duration) -> Option<ScheduledTask> {
        let mut state = self.state.lock();
        let next = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= target)
            .min_by_key(|(_, entry)| (entry.deadline, entry.seq))
            .map(|(id, _)| id);

        let Some(id) = next else {
            state.elapsed = target;
            return None;
        };

        let entry = &state.entries[id];
        let (deadline, period) = (entry.deadline, entry.period);
        let task = Arc::clone(&entry.task);
        match period {
            Some(period) => state.entries[id].deadline += period,
            None => {
                state.entries.remove(id);
            }
        }
        state.elapsed = deadline;
        Some(task)
    }

    fn arm(&self, delay: Duration, period: Option<Duration>, task: ScheduledTask) -> ScheduleId {
        let mut state = self.state.lock();
        let deadline = state.elapsed + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(Entry {
            deadline,
            period,
            seq,
            task,
        })
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, period: Duration, task: ScheduledTask) -> ScheduleId {
        let period = period.max(MIN_PERIOD);
        self.arm(period, Some(period), task)
    }

    fn schedule_once(&self, delay: Duration, task: ScheduledTask) -> ScheduleId {
        self.arm(delay, None, task)
    }

    fn cancel(&self, id: ScheduleId) {
        self.state.lock().entries.remove(id);
    }

    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::milliseconds(self.elapsed().as_millis() as i64);
        self.wall_origin + elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> (Arc<AtomicU32>, ScheduledTask) {
        let hits = Arc::new(AtomicU32::new(0));
        let task_hits = Arc::clone(&hits);
        let task: ScheduledTask = Arc::new(move || {
            task_hits.fetch_add(1, Ordering::SeqCst);
        });
        (hits, task)
    }

    #[test]
    fn repeating_fires_once_per_period() {
        let scheduler = ManualScheduler::new();
        let (hits, task) = counter();
        scheduler.schedule_repeating(Duration::from_millis(250), task);

        scheduler.advance_ms(249);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        scheduler.advance_ms(1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        scheduler.advance_ms(1000);
        assert_eq!(hits.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.elapsed(), Duration::from_millis(1250));
    }

    #[test]
    fn once_fires_then_disappears() {
        let scheduler = ManualScheduler::new();
        let (hits, task) = counter();
        scheduler.schedule_once(Duration::from_secs(2), task);
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance_ms(5000);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let scheduler = ManualScheduler::new();
        let (hits, task) = counter();
        let id = scheduler.schedule_repeating(Duration::from_millis(100), task);

        scheduler.advance_ms(100);
        scheduler.cancel(id);
        scheduler.cancel(id);
        scheduler.advance_ms(1000);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ties_run_in_arming_order() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&order);
        scheduler.schedule_repeating(
            Duration::from_secs(1),
            Arc::new(move || log.lock().push("repeat")),
        );
        let log = Arc::clone(&order);
        scheduler.schedule_once(Duration::from_secs(2), Arc::new(move || log.lock().push("once")));

        scheduler.advance_ms(2000);
        assert_eq!(*order.lock(), vec!["repeat", "repeat", "once"]);
    }

    #[test]
    fn task_can_cancel_itself() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicU32::new(0));
        let slot: Arc<Mutex<Option<ScheduleId>>> = Arc::new(Mutex::new(None));

        let inner = scheduler.clone();
        let task_hits = Arc::clone(&hits);
        let task_slot = Arc::clone(&slot);
        let id = scheduler.schedule_repeating(
            Duration::from_millis(10),
            Arc::new(move || {
                task_hits.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *task_slot.lock() {
                    inner.cancel(id);
                }
            }),
        );
        *slot.lock() = Some(id);

        scheduler.advance_ms(100);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn task_observes_its_own_deadline() {
        let scheduler = ManualScheduler::new();
        let seen = Arc::new(Mutex::new(None));

        let inner = scheduler.clone();
        let log = Arc::clone(&seen);
        scheduler.schedule_once(
            Duration::from_millis(300),
            Arc::new(move || *log.lock() = Some(inner.elapsed())),
        );

        scheduler.advance_ms(1000);
        assert_eq!(*seen.lock(), Some(Duration::from_millis(300)));
    }
}
