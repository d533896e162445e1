use anyhow::Result;
use clocky::prelude::*;
use clocky::{CLOCK_NAME, VERSION as LIB_VERSION};
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct MyHighlighter;

impl Highlighter for MyHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    // Embedded at compile time from the crate root.
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.cyan());

    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );

    println!("{}", "-----------------------------------------------------------------".dimmed());

    let license_blurb = "
    This software is provided 'as is', without warranty of any kind.
    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.
    ";

    println!("{}", version_string);
    println!("{}", license_blurb.dimmed());

    println!("{}", "-----------------------------------------------------------------".dimmed());
}

/// Spawns a task that prints every event the clock fires.
///
/// Lifecycle events are always shown; ticks only while the shared flag is set.
fn spawn_event_listener(clock: &Clock, show_ticks: Arc<AtomicBool>) {
    let mut events = clock.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ClockNotification { event: ClockEvent::Tick, args }) => {
                    if show_ticks.load(Ordering::Relaxed) {
                        println!("<-- [TICK] #{} ({}s)", args.tick_count, args.elapsed);
                    }
                }
                Ok(ClockNotification { event, args }) => {
                    println!(
                        "\n<-- [{}] ticks={} elapsed={}s\n>> ",
                        event.as_str().to_uppercase(),
                        args.tick_count,
                        args.elapsed
                    );
                }
                Err(RecvError::Lagged(missed)) => {
                    println!("<-- [EVENTS] {} events dropped", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Parses `on`/`off` into a flag.
fn parse_switch(word: Option<&&str>) -> Option<bool> {
    match word.copied() {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    }
}

/// The rows shown by `status`, with every value starting in the same column.
fn status_lines(clock: &Clock) -> Vec<String> {
    let mut lines = vec![
        format!("Status:         {}", clock.status().as_str().cyan()),
        format!("Ticks:          {}", clock.tick_count()),
        format!("Tick period:    {:?}", clock.tick_period()),
        match clock.run_for() {
            Some(run_for) => format!("Run for:        {:?}", run_for),
            None => "Run for:        unbounded".to_string(),
        },
        format!("Tick on start:  {}", clock.tick_on_start()),
        format!("Tick on resume: {}", clock.tick_on_resume()),
    ];
    if let Some(started_at) = clock.started_at() {
        lines.push(format!("Started at:     {}", started_at));
    }
    if let Some(elapsed) = clock.elapsed() {
        lines.push(format!("Elapsed:        {}s", elapsed));
    }
    lines
}

fn print_status(clock: &Clock) {
    for line in status_lines(clock) {
        println!("{}", line);
    }
}

/// Applies one `set` command.
fn apply_setting(clock: &Clock, args: &[&str]) -> Result<()> {
    match (args.get(1).copied(), args.get(2)) {
        (Some("tick"), Some(value)) => {
            let seconds: f64 = value.parse()?;
            clock.set_tick_every(seconds)?;
            println!("--> Ticking every {:?}.", clock.tick_period());
        }
        (Some("runfor"), Some(value)) => {
            let seconds: f64 = value.parse()?;
            clock.set_run_for(seconds)?;
            println!("--> Run duration set.");
        }
        (Some("tickonstart"), switch) => match parse_switch(switch) {
            Some(enabled) => {
                clock.set_tick_on_start(enabled);
                println!("--> Tick on start: {}.", enabled);
            }
            None => println!("Usage: set tickonstart on|off"),
        },
        (Some("tickonresume"), switch) => match parse_switch(switch) {
            Some(enabled) => {
                clock.set_tick_on_resume(enabled);
                println!("--> Tick on resume: {}.", enabled);
            }
            None => println!("Usage: set tickonresume on|off"),
        },
        _ => println!("Usage: set tick <S> | set runfor <S> | set tickonstart on|off | set tickonresume on|off"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let config_path = env::var("CLOCKSHELL_CONFIG").ok().map(PathBuf::from);
    let config = ClockConfig::load(config_path.as_deref())?;
    let clock = Clock::with_options(Arc::new(TokioScheduler::current()?), config.into())?;

    // Create the shared flag for the tick printer.
    let show_ticks = Arc::new(AtomicBool::new(false));
    spawn_event_listener(&clock, show_ticks.clone());

    info!("{} ready with a {:?} tick period.", CLOCK_NAME.cyan(), clock.tick_period());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut rl = Editor::new()?;
    let helper = MyHighlighter {};
    rl.set_helper(Some(helper));

    println!("{} shell is ready. Type 'help' for commands or 'exit' to quit.", CLOCK_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();

                if let Some(command) = args.first() {
                    let outcome = match *command {
                        "start" => clock.start().map(|_| ()),
                        "pause" => clock.pause().map(|_| ()),
                        "resume" => clock.resume().map(|_| ()),
                        "stop" => {
                            clock.stop();
                            Ok(())
                        }
                        "status" => {
                            print_status(&clock);
                            Ok(())
                        }
                        "set" => {
                            if let Err(e) = apply_setting(&clock, &args) {
                                println!("Error: {}", e);
                            }
                            Ok(())
                        }
                        "ticks" => {
                            match parse_switch(args.get(1)) {
                                Some(enabled) => {
                                    show_ticks.store(enabled, Ordering::Relaxed);
                                    println!("--> Tick printing {}.", if enabled { "on" } else { "off" });
                                }
                                None => println!("Usage: ticks on|off"),
                            }
                            Ok(())
                        }
                        "help" => {
                            println!("Available commands:");
                            println!("  start                     - Starts the clock from zero.");
                            println!("  pause                     - Pauses a running clock.");
                            println!("  resume                    - Resumes a paused clock.");
                            println!("  stop                      - Stops the clock.");
                            println!("  status                    - Shows the clock's state and settings.");
                            println!("  set tick <S>              - Ticks every S seconds (clock must be stopped).");
                            println!("  set runfor <S>            - Stops S seconds after start, 0 for never.");
                            println!("  set tickonstart on|off    - Ticks immediately on start.");
                            println!("  set tickonresume on|off   - Ticks immediately on resume.");
                            println!("  ticks on|off              - Prints every tick as it happens.");
                            println!("  exit                      - Quits the shell.");
                            Ok(())
                        }
                        "exit" => break,
                        _ => {
                            println!("Unknown command: '{}'. Type 'help'.", line);
                            Ok(())
                        }
                    };
                    if let Err(e) = outcome {
                        println!("Error: {}", e);
                    }
                }
            }
            Err(_) => {
                println!("Exiting clockshell...");
                break;
            }
        }
    }

    clock.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_values_line_up() {
        let scheduler = ManualScheduler::new();
        let clock = Clock::new(Arc::new(scheduler.clone()));
        clock.set_tick_on_resume(true).start().unwrap();
        scheduler.advance_ms(1000);

        let lines = status_lines(&clock);
        assert_eq!(lines.len(), 8);
        for line in &lines {
            let (label, value) = line.split_at(16);
            assert!(label.ends_with(' '), "label column too short in {:?}", line);
            assert!(!value.starts_with(' '), "value misaligned in {:?}", line);
        }
        assert!(lines.contains(&"Tick on resume: true".to_string()));
    }
}
