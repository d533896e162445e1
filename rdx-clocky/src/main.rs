use anyhow::Result;
use clocky::prelude::*;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    // 2. Load settings from the file named on the command line, if any.
    //    Without one, run for five seconds and tick every two.
    let path = env::args().nth(1).map(PathBuf::from);
    let mut config = ClockConfig::load(path.as_deref())?;
    config.tick_every.get_or_insert(2.0);
    config.run_for.get_or_insert(5.0);

    // 3. Create the clock on this runtime.
    let clock = Clock::with_options(Arc::new(TokioScheduler::current()?), config.into())?;
    clock
        .on_start(|_, args| info!("[START] at {}", args.started_at))
        .on_tick(|_, args| info!("[TICK] tick number {} ({}s)", args.tick_count, args.elapsed))
        .on_stop(|_, args| info!("[STOP] after {} ticks and {}s", args.tick_count, args.elapsed));

    // 4. Subscribe before starting, then wait for the clock to stop itself.
    let mut events = clock.subscribe_events();
    clock.start()?;

    let unbounded = clock.run_for().is_none();
    if unbounded {
        info!("No run duration configured. Press Ctrl+C to stop.");
    }
    loop {
        tokio::select! {
            notification = events.recv() => match notification {
                Ok(notification) if notification.event == ClockEvent::Stop => break,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                clock.stop();
                break;
            }
        }
    }

    Ok(())
}
