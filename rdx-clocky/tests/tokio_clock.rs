use clocky::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn tokio_clock() -> (Clock, TokioScheduler) {
    let scheduler = TokioScheduler::current().expect("inside a runtime");
    (Clock::new(Arc::new(scheduler.clone())), scheduler)
}

fn tick_counter(clock: &Clock) -> Arc<AtomicU64> {
    let ticks = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&ticks);
    clock.on_tick(move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    ticks
}

#[tokio::test(start_paused = true)]
async fn ticks_follow_the_runtime_clock() {
    let (clock, _scheduler) = tokio_clock();
    let ticks = tick_counter(&clock);
    clock.start().unwrap();

    sleep(Duration::from_millis(4_100)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 4);
    assert_eq!(clock.tick_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn pause_halts_ticks_until_resume() {
    let (clock, _scheduler) = tokio_clock();
    let ticks = tick_counter(&clock);
    clock.set_tick_every(1.0).unwrap().start().unwrap();

    sleep(Duration::from_millis(1_100)).await;
    clock.pause().unwrap();
    sleep(Duration::from_millis(4_000)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 1);

    clock.resume().unwrap();
    sleep(Duration::from_millis(10_050)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 11);
}

#[tokio::test(start_paused = true)]
async fn run_for_stops_and_releases_tasks() {
    let (clock, scheduler) = tokio_clock();
    let mut events = clock.subscribe_events();
    clock
        .set_run_for(3.5)
        .unwrap()
        .set_tick_every(1.0)
        .unwrap()
        .start()
        .unwrap();
    assert_eq!(scheduler.active_schedules(), 2);

    let mut last = None;
    while let Ok(notification) = events.recv().await {
        let stopped = notification.event == ClockEvent::Stop;
        last = Some(notification);
        if stopped {
            break;
        }
    }

    let last = last.expect("clock fired events");
    assert_eq!(last.event, ClockEvent::Stop);
    assert_eq!(last.args.tick_count, 3);
    assert_eq!(last.args.elapsed, 4);
    assert!(clock.is_stopped());
    assert_eq!(scheduler.active_schedules(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_ticks() {
    let (clock, scheduler) = tokio_clock();
    let ticks = tick_counter(&clock);
    clock.start().unwrap();

    sleep(Duration::from_millis(2_500)).await;
    clock.stop();
    assert_eq!(scheduler.active_schedules(), 0);

    sleep(Duration::from_millis(5_000)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 2);
}

#[test]
fn scheduler_requires_a_runtime() {
    assert!(matches!(
        TokioScheduler::current(),
        Err(ClockError::NoRuntime(_))
    ));
}
