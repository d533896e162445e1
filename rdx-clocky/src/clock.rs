//! The clock: a pausable interval timer with lifecycle events.

use crate::common::{ScheduleId, Status};
use crate::config::ClockOptions;
use crate::error::{ClockError, Result};
use crate::events::{ClockEvent, ClockNotification, EventArgs, EventHandler, Handlers};
use crate::scheduler::Scheduler;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, trace};

const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1000);
const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A point in time as the clock records it: monotonic for arithmetic, wall
/// clock for reporting.
#[derive(Debug, Clone, Copy)]
struct Stamp {
    instant: Instant,
    wall: DateTime<Utc>,
}

#[derive(Debug)]
struct RunState {
    status: Status,
    tick_count: u64,
    started_at: Option<Stamp>,
    paused_at: Option<Stamp>,
    tick_period: Duration,
    /// Zero means unbounded.
    run_for: Duration,
    tick_on_start: bool,
    tick_on_resume: bool,
    pending_tick: Option<ScheduleId>,
    pending_stop: Option<ScheduleId>,
    /// Bumped on every transition; scheduled callbacks from an older
    /// generation are ignored.
    generation: u64,
}

impl RunState {
    fn require(&self, operation: &'static str, required: Status) -> Result<()> {
        if self.status == required {
            Ok(())
        } else {
            Err(ClockError::InvalidState {
                operation,
                required,
                status: self.status,
            })
        }
    }

    fn args(&self, now: Instant) -> Option<EventArgs> {
        let started = self.started_at?;
        Some(EventArgs {
            tick_count: self.tick_count,
            started_at: started.wall,
            elapsed: whole_seconds(now.saturating_duration_since(started.instant)),
        })
    }

    fn take_schedules(&mut self) -> impl Iterator<Item = ScheduleId> {
        self.pending_tick.take().into_iter().chain(self.pending_stop.take())
    }
}

struct ClockInner {
    scheduler: Arc<dyn Scheduler>,
    state: Mutex<RunState>,
    handlers: Mutex<Handlers>,
    events: broadcast::Sender<ClockNotification>,
}

impl Drop for ClockInner {
    fn drop(&mut self) {
        for id in self.state.get_mut().take_schedules() {
            self.scheduler.cancel(id);
        }
    }
}

/// A stateful interval timer.
///
/// A `Clock` is a cheap handle; clones drive the same timer. It moves through
/// `start → [pause → resume]* → stop` and may be started again after stopping.
/// While running it fires a `tick` every tick period and, when a run duration
/// is configured, stops itself that long after `start`. Each `resume` re-arms
/// the auto-stop for the run duration less the length of the pause.
///
/// Builder and lifecycle methods return `&Clock`, so calls chain:
///
/// ```rust
/// use clocky::prelude::*;
/// use std::sync::Arc;
///
/// let scheduler = ManualScheduler::new();
/// let clock = Clock::new(Arc::new(scheduler.clone()));
/// clock
///     .set_run_for(4.0)?
///     .set_tick_every(2.0)?
///     .set_tick_on_start(true)
///     .on_tick(|_clock, args| println!("tick {}", args.tick_count))
///     .start()?;
///
/// scheduler.advance_ms(4000);
/// assert!(clock.is_stopped());
/// # Ok::<(), clocky::ClockError>(())
/// ```
///
/// Handlers are invoked with no internal lock held and may call back into the
/// clock. A handler that captures a clone of its own clock keeps the clock
/// alive for as long as the handler stays registered.
#[derive(Clone)]
pub struct Clock {
    inner: Arc<ClockInner>,
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Clock")
            .field("status", &state.status)
            .field("tick_count", &state.tick_count)
            .field("tick_period", &state.tick_period)
            .field("run_for", &state.run_for)
            .finish_non_exhaustive()
    }
}

// Construction and configuration.
impl Clock {
    /// Creates a stopped clock with a one second tick period and no run limit.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ClockInner {
                scheduler,
                state: Mutex::new(RunState {
                    status: Status::Stopped,
                    tick_count: 0,
                    started_at: None,
                    paused_at: None,
                    tick_period: DEFAULT_TICK_PERIOD,
                    run_for: Duration::ZERO,
                    tick_on_start: false,
                    tick_on_resume: false,
                    pending_tick: None,
                    pending_stop: None,
                    generation: 0,
                }),
                handlers: Mutex::new(Handlers::default()),
                events,
            }),
        }
    }

    /// Creates a clock and applies every option that is set, through the same
    /// setters and validation as the builder methods.
    pub fn with_options(scheduler: Arc<dyn Scheduler>, options: ClockOptions) -> Result<Self> {
        let clock = Self::new(scheduler);
        let ClockOptions {
            config,
            on_start,
            on_pause,
            on_resume,
            on_stop,
            on_tick,
        } = options;

        if let Some(seconds) = config.tick_every {
            clock.set_tick_every(seconds)?;
        }
        if let Some(seconds) = config.run_for {
            clock.set_run_for(seconds)?;
        }
        if let Some(enabled) = config.tick_on_start {
            clock.set_tick_on_start(enabled);
        }
        if let Some(enabled) = config.tick_on_resume {
            clock.set_tick_on_resume(enabled);
        }

        let handlers = [
            (ClockEvent::Start, on_start),
            (ClockEvent::Pause, on_pause),
            (ClockEvent::Resume, on_resume),
            (ClockEvent::Stop, on_stop),
            (ClockEvent::Tick, on_tick),
        ];
        for (event, handler) in handlers {
            if let Some(handler) = handler {
                clock.inner.handlers.lock().set(event, handler);
            }
        }
        Ok(clock)
    }

    /// Sets the number of seconds between ticks.
    ///
    /// Fails with `InvalidArgument` unless `seconds` is a finite number above
    /// zero, and with `InvalidState` unless the clock is stopped. Periods
    /// below one millisecond are raised to one millisecond.
    pub fn set_tick_every(&self, seconds: f64) -> Result<&Self> {
        let invalid = || ClockError::InvalidArgument {
            parameter: "tick_every",
            expected: "a positive number of seconds",
            received: seconds.to_string(),
        };
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(invalid());
        }
        let period = Duration::try_from_secs_f64(seconds).map_err(|_| invalid())?;

        let mut state = self.inner.state.lock();
        state.require("set_tick_every", Status::Stopped)?;
        state.tick_period = period.max(MIN_TICK_PERIOD);
        Ok(self)
    }

    /// Sets how many seconds after `start` the clock stops itself. Zero, and
    /// any negative value, means it runs until stopped.
    ///
    /// Fails with `InvalidArgument` if `seconds` is not a finite number, and
    /// with `InvalidState` unless the clock is stopped.
    pub fn set_run_for(&self, seconds: f64) -> Result<&Self> {
        let invalid = || ClockError::InvalidArgument {
            parameter: "run_for",
            expected: "a number of seconds",
            received: seconds.to_string(),
        };
        if !seconds.is_finite() {
            return Err(invalid());
        }
        let run_for = if seconds <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(seconds).map_err(|_| invalid())?
        };

        let mut state = self.inner.state.lock();
        state.require("set_run_for", Status::Stopped)?;
        state.run_for = run_for;
        Ok(self)
    }

    /// Whether `start` fires one tick immediately.
    pub fn set_tick_on_start(&self, enabled: bool) -> &Self {
        self.inner.state.lock().tick_on_start = enabled;
        self
    }

    /// Whether `resume` fires one tick immediately.
    pub fn set_tick_on_resume(&self, enabled: bool) -> &Self {
        self.inner.state.lock().tick_on_resume = enabled;
        self
    }

    /// Registers `handler` for the event named `event`, replacing any handler
    /// registered before. Fails with `UnknownEvent` for names other than
    /// `start`, `pause`, `resume`, `stop` and `tick`.
    pub fn on(
        &self,
        event: &str,
        handler: impl Fn(&Clock, &EventArgs) + Send + Sync + 'static,
    ) -> Result<&Self> {
        let event = event.parse::<ClockEvent>()?;
        Ok(self.on_event(event, handler))
    }

    /// Registers `handler` for `event`, replacing any handler registered before.
    pub fn on_event(
        &self,
        event: ClockEvent,
        handler: impl Fn(&Clock, &EventArgs) + Send + Sync + 'static,
    ) -> &Self {
        let handler: EventHandler = Arc::new(handler);
        self.inner.handlers.lock().set(event, handler);
        self
    }

    pub fn on_start(&self, handler: impl Fn(&Clock, &EventArgs) + Send + Sync + 'static) -> &Self {
        self.on_event(ClockEvent::Start, handler)
    }

    pub fn on_pause(&self, handler: impl Fn(&Clock, &EventArgs) + Send + Sync + 'static) -> &Self {
        self.on_event(ClockEvent::Pause, handler)
    }

    pub fn on_resume(&self, handler: impl Fn(&Clock, &EventArgs) + Send + Sync + 'static) -> &Self {
        self.on_event(ClockEvent::Resume, handler)
    }

    pub fn on_stop(&self, handler: impl Fn(&Clock, &EventArgs) + Send + Sync + 'static) -> &Self {
        self.on_event(ClockEvent::Stop, handler)
    }

    pub fn on_tick(&self, handler: impl Fn(&Clock, &EventArgs) + Send + Sync + 'static) -> &Self {
        self.on_event(ClockEvent::Tick, handler)
    }

    /// Subscribes to every event this clock fires from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClockNotification> {
        self.inner.events.subscribe()
    }
}

// Lifecycle.
impl Clock {
    /// Starts the clock from a fresh count.
    ///
    /// Fires `start`, then one tick if `tick_on_start` is set, then arms the
    /// repeating tick and, with a run limit, the auto-stop. Fails with
    /// `InvalidState` unless the clock is stopped.
    pub fn start(&self) -> Result<&Self> {
        let now = self.stamp();
        let (generation, tick_now, run_for) = {
            let mut state = self.inner.state.lock();
            state.require("start", Status::Stopped)?;
            state.status = Status::Running;
            state.tick_count = 0;
            state.started_at = Some(now);
            state.paused_at = None;
            state.generation += 1;
            (state.generation, state.tick_on_start, state.run_for)
        };
        info!("Clock started.");

        self.fire(ClockEvent::Start);
        if tick_now {
            self.tick(generation);
        }
        self.arm(generation, (!run_for.is_zero()).then_some(run_for));
        Ok(self)
    }

    /// Pauses a running clock, suspending ticks and the auto-stop countdown.
    ///
    /// Fails with `InvalidState` unless the clock is running.
    pub fn pause(&self) -> Result<&Self> {
        let now = self.stamp();
        {
            let mut state = self.inner.state.lock();
            state.require("pause", Status::Running)?;
            state.status = Status::Paused;
            state.paused_at = Some(now);
            state.generation += 1;
            self.disarm(&mut state);
        }
        info!("Clock paused.");

        self.fire(ClockEvent::Pause);
        Ok(self)
    }

    /// Resumes a paused clock.
    ///
    /// With a run limit, the auto-stop is re-armed for the full run duration
    /// less the time spent in this pause, counted in whole seconds. A pause
    /// at least as long as the run duration leaves a zero delay, so the clock
    /// stops as soon as the scheduler next runs.
    /// Fires `resume`, then one tick if `tick_on_resume` is set. Fails with
    /// `InvalidState` unless the clock is paused.
    pub fn resume(&self) -> Result<&Self> {
        let now = self.stamp();
        let (generation, tick_now, remaining) = {
            let mut state = self.inner.state.lock();
            state.require("resume", Status::Paused)?;
            state.status = Status::Running;
            state.generation += 1;
            let paused_for = state
                .paused_at
                .map(|paused| now.instant.saturating_duration_since(paused.instant))
                .unwrap_or_default();
            let remaining = (!state.run_for.is_zero())
                .then(|| state.run_for.saturating_sub(Duration::from_secs(whole_seconds(paused_for))));
            (state.generation, state.tick_on_resume, remaining)
        };
        info!("Clock resumed.");

        self.arm(generation, remaining);
        self.fire(ClockEvent::Resume);
        if tick_now {
            self.tick(generation);
        }
        Ok(self)
    }

    /// Stops the clock and cancels everything it has scheduled.
    ///
    /// Allowed from any status; stopping a stopped clock does nothing and
    /// fires no event.
    pub fn stop(&self) -> &Self {
        {
            let mut state = self.inner.state.lock();
            if state.status == Status::Stopped {
                trace!("Clock already stopped.");
                return self;
            }
            state.status = Status::Stopped;
            state.generation += 1;
            self.disarm(&mut state);
        }
        info!("Clock stopped.");

        self.fire(ClockEvent::Stop);
        self
    }
}

// Queries.
impl Clock {
    pub fn status(&self) -> Status {
        self.inner.state.lock().status
    }

    pub fn is_stopped(&self) -> bool {
        self.status() == Status::Stopped
    }

    pub fn is_running(&self) -> bool {
        self.status() == Status::Running
    }

    pub fn is_paused(&self) -> bool {
        self.status() == Status::Paused
    }

    /// Ticks fired since the most recent `start`.
    pub fn tick_count(&self) -> u64 {
        self.inner.state.lock().tick_count
    }

    /// Wall-clock time of the most recent `start`.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().started_at.map(|stamp| stamp.wall)
    }

    /// Wall-clock time of the most recent `pause`.
    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().paused_at.map(|stamp| stamp.wall)
    }

    /// Whole seconds since the most recent `start`, paused time included.
    pub fn elapsed(&self) -> Option<u64> {
        let now = self.inner.scheduler.now();
        self.inner
            .state
            .lock()
            .started_at
            .map(|started| whole_seconds(now.saturating_duration_since(started.instant)))
    }

    pub fn tick_period(&self) -> Duration {
        self.inner.state.lock().tick_period
    }

    /// The configured run limit, or `None` when unbounded.
    pub fn run_for(&self) -> Option<Duration> {
        let run_for = self.inner.state.lock().run_for;
        (!run_for.is_zero()).then_some(run_for)
    }

    pub fn tick_on_start(&self) -> bool {
        self.inner.state.lock().tick_on_start
    }

    pub fn tick_on_resume(&self) -> bool {
        self.inner.state.lock().tick_on_resume
    }
}

// Internals.
impl Clock {
    fn stamp(&self) -> Stamp {
        Stamp {
            instant: self.inner.scheduler.now(),
            wall: self.inner.scheduler.timestamp(),
        }
    }

    /// Arms the repeating tick and, when `stop_after` is set, the auto-stop.
    /// Does nothing if the clock has moved on since `generation` began, which
    /// happens when a handler stops or pauses it mid-transition.
    fn arm(&self, generation: u64, stop_after: Option<Duration>) {
        let mut state = self.inner.state.lock();
        if state.generation != generation || state.status != Status::Running {
            debug!("Skipping schedule arming for superseded generation {}.", generation);
            return;
        }
        let scheduler = &self.inner.scheduler;

        let weak = Arc::downgrade(&self.inner);
        let tick_id = scheduler.schedule_repeating(
            state.tick_period,
            Arc::new(move || {
                if let Some(clock) = Clock::upgrade(&weak) {
                    clock.tick(generation);
                }
            }),
        );
        state.pending_tick = Some(tick_id);
        debug!("Armed tick schedule {:?} every {:?}.", tick_id, state.tick_period);

        if let Some(delay) = stop_after {
            let weak = Arc::downgrade(&self.inner);
            let stop_id = scheduler.schedule_once(
                delay,
                Arc::new(move || {
                    if let Some(clock) = Clock::upgrade(&weak) {
                        clock.expire(generation);
                    }
                }),
            );
            state.pending_stop = Some(stop_id);
            debug!("Armed auto-stop {:?} in {:?}.", stop_id, delay);
        }
    }

    fn disarm(&self, state: &mut RunState) {
        for id in state.take_schedules() {
            debug!("Cancelling schedule {:?}.", id);
            self.inner.scheduler.cancel(id);
        }
    }

    fn upgrade(weak: &Weak<ClockInner>) -> Option<Clock> {
        weak.upgrade().map(|inner| Clock { inner })
    }

    fn tick(&self, generation: u64) {
        let now = self.inner.scheduler.now();
        let args = {
            let mut state = self.inner.state.lock();
            if state.generation != generation || state.status != Status::Running {
                trace!("Dropping stale tick from generation {}.", generation);
                return;
            }
            state.tick_count += 1;
            state.args(now)
        };
        if let Some(args) = args {
            trace!("Tick #{} at {}s.", args.tick_count, args.elapsed);
            self.emit(ClockEvent::Tick, args);
        }
    }

    fn expire(&self, generation: u64) {
        {
            let state = self.inner.state.lock();
            if state.generation != generation || state.status != Status::Running {
                trace!("Dropping stale auto-stop from generation {}.", generation);
                return;
            }
        }
        info!("Run duration reached.");
        self.stop();
    }

    fn fire(&self, event: ClockEvent) {
        let now = self.inner.scheduler.now();
        let args = self.inner.state.lock().args(now);
        if let Some(args) = args {
            self.emit(event, args);
        }
    }

    fn emit(&self, event: ClockEvent, args: EventArgs) {
        self.inner
            .events
            .send(ClockNotification {
                event,
                args: args.clone(),
            })
            .ok();
        let handler = self.inner.handlers.lock().get(event);
        if let Some(handler) = handler {
            handler(self, &args);
        }
    }
}

/// Rounds a duration to the nearest whole second, halves rounding up.
fn whole_seconds(duration: Duration) -> u64 {
    let millis = duration.as_millis() + 500;
    (millis / 1000) as u64
}
