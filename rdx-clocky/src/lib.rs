//! # Clocky
//!
//! A small, stateful interval clock for Rust.
//!
//! A `Clock` fires a `tick` at a fixed period while it runs and notifies its
//! consumer of every lifecycle transition. It can stop itself a given number
//! of seconds after starting; each resume re-arms that countdown less the
//! length of the pause.
//!
//! ## Core Concepts
//!
//! - **Clock**: The state machine. It moves through
//!   `start → [pause → resume]* → stop` and can be restarted any number of times.
//! - **Events**: `start`, `pause`, `resume`, `stop` and `tick`. Each event has
//!   at most one handler on the clock, and every firing is also broadcast as a
//!   `ClockNotification` to any subscriber.
//! - **Scheduler**: The clock never owns a timer. It arms repeating and
//!   one-shot callbacks on a `Scheduler`, either the Tokio-backed
//!   `TokioScheduler` or the virtual-time `ManualScheduler`.
//! - **Configuration**: Settings live in a `ClockConfig`, which can be loaded
//!   from a TOML file and the environment.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use clocky::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Create a clock on the current Tokio runtime.
//!     let clock = Clock::new(Arc::new(TokioScheduler::current()?));
//!
//!     // 2. Subscribe before starting so no event is missed.
//!     let mut events = clock.subscribe_events();
//!
//!     // 3. Configure it and start it.
//!     clock
//!         .set_run_for(5.0)?
//!         .set_tick_every(2.0)?
//!         .on_tick(|_clock, args| println!("tick number {}", args.tick_count))
//!         .start()?;
//!
//!     // 4. Wait for the automatic stop.
//!     while let Ok(notification) = events.recv().await {
//!         if notification.event == ClockEvent::Stop {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub const CLOCK_NAME: &str = "Clocky";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod clock;
pub mod common;
pub mod config;
pub mod error;
pub mod events;
pub mod scheduler;

pub use error::{ClockError, Result};

/// A prelude module for easy importing of the most common Clocky types.
pub mod prelude {
    pub use crate::clock::Clock;
    pub use crate::common::{ScheduleId, Status};
    pub use crate::config::{ClockConfig, ClockOptions};
    pub use crate::error::ClockError;
    pub use crate::events::{ClockEvent, ClockNotification, EventArgs, EventHandler};
    pub use crate::scheduler::{ManualScheduler, Scheduler, TokioScheduler};
}
