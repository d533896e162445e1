//! Contains common, primitive types shared across the crate.
//!
//! This module defines the clock's status and the handle type used to
//! identify scheduled callbacks.

use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Uniquely identifies a callback registered with a `Scheduler`.
    ///
    /// The key is returned when a repeating or one-shot callback is armed and
    /// is the only way to cancel it. Keys are generational, so a stale id left
    /// over from a superseded schedule can never cancel a newer one.
    pub struct ScheduleId;
}

/// The lifecycle status of a `Clock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl Status {
    /// The lowercase label of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Stopped => "stopped",
            Status::Running => "running",
            Status::Paused => "paused",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_display() {
        assert_eq!(Status::default(), Status::Stopped);
        assert_eq!(Status::Running.to_string(), "running");
        assert_eq!(Status::Paused.as_str(), "paused");
    }
}
