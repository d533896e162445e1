//! Defines the events a `Clock` fires and the payload delivered with them.
//!
//! Consumers either register one handler per event on the clock itself, or
//! subscribe to the broadcast stream of `ClockNotification`s. Both receive the
//! same `EventArgs` for a given firing.

use crate::clock::Clock;
use crate::error::ClockError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A callback registered for one `ClockEvent`.
///
/// The clock that fired the event is passed as the first argument, so a
/// handler can query or drive the clock that invoked it.
pub type EventHandler = Arc<dyn Fn(&Clock, &EventArgs) + Send + Sync>;

/// The fixed set of events a clock can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockEvent {
    Start,
    Pause,
    Resume,
    Stop,
    Tick,
}

impl ClockEvent {
    /// All events, in registration order.
    pub const ALL: [ClockEvent; 5] = [
        ClockEvent::Start,
        ClockEvent::Pause,
        ClockEvent::Resume,
        ClockEvent::Stop,
        ClockEvent::Tick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClockEvent::Start => "start",
            ClockEvent::Pause => "pause",
            ClockEvent::Resume => "resume",
            ClockEvent::Stop => "stop",
            ClockEvent::Tick => "tick",
        }
    }
}

impl fmt::Display for ClockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClockEvent {
    type Err = ClockError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ClockEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == name)
            .ok_or_else(|| ClockError::UnknownEvent {
                name: name.to_string(),
                expected: ClockEvent::ALL
                    .iter()
                    .map(|event| format!("\"{}\"", event))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// The arguments every event is fired with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventArgs {
    /// Ticks fired since the most recent `start`.
    pub tick_count: u64,
    /// Wall-clock time of the most recent `start`.
    pub started_at: DateTime<Utc>,
    /// Whole seconds between the firing and `started_at`, rounded to nearest.
    pub elapsed: u64,
}

/// A fired event as seen on the broadcast stream.
#[derive(Debug, Clone)]
pub struct ClockNotification {
    pub event: ClockEvent,
    pub args: EventArgs,
}

/// Per-event handler slots. Exactly one slot exists for each `ClockEvent`.
#[derive(Default, Clone)]
pub(crate) struct Handlers {
    start: Option<EventHandler>,
    pause: Option<EventHandler>,
    resume: Option<EventHandler>,
    stop: Option<EventHandler>,
    tick: Option<EventHandler>,
}

impl Handlers {
    fn slot(&mut self, event: ClockEvent) -> &mut Option<EventHandler> {
        match event {
            ClockEvent::Start => &mut self.start,
            ClockEvent::Pause => &mut self.pause,
            ClockEvent::Resume => &mut self.resume,
            ClockEvent::Stop => &mut self.stop,
            ClockEvent::Tick => &mut self.tick,
        }
    }

    /// Replaces the handler for `event`; last registration wins.
    pub(crate) fn set(&mut self, event: ClockEvent, handler: EventHandler) {
        *self.slot(event) = Some(handler);
    }

    pub(crate) fn get(&self, event: ClockEvent) -> Option<EventHandler> {
        match event {
            ClockEvent::Start => self.start.clone(),
            ClockEvent::Pause => self.pause.clone(),
            ClockEvent::Resume => self.resume.clone(),
            ClockEvent::Stop => self.stop.clone(),
            ClockEvent::Tick => self.tick.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_event_name() {
        for event in ClockEvent::ALL {
            assert_eq!(event.as_str().parse::<ClockEvent>(), Ok(event));
        }
    }

    #[test]
    fn unknown_name_lists_valid_events() {
        let err = "random".parse::<ClockEvent>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown event: the event must be one of \"start\", \"pause\", \"resume\", \"stop\", \"tick\". Received \"random\""
        );
    }

    #[test]
    fn names_are_case_sensitive() {
        assert!("Start".parse::<ClockEvent>().is_err());
    }
}
