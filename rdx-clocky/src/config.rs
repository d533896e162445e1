//! Defines the configuration structures for a `Clock`.
//!
//! `ClockConfig` holds the plain settings and derives `Deserialize`, so it can
//! be loaded from a TOML file and `CLOCKY_*` environment variables with the
//! `config` crate. `ClockOptions` adds the event handlers, which only code can
//! supply, and is what `Clock::with_options` consumes.

use crate::events::EventHandler;
use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

/// Settings applied to a clock at construction.
///
/// Every field is optional; an unset field leaves the clock's default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Seconds between ticks. Must be above zero.
    pub tick_every: Option<f64>,

    /// Seconds after `start` before the clock stops itself. Zero or
    /// negative means it runs until stopped.
    pub run_for: Option<f64>,

    /// Fire a tick as soon as the clock starts.
    pub tick_on_start: Option<bool>,

    /// Fire a tick as soon as the clock resumes.
    pub tick_on_resume: Option<bool>,
}

impl ClockConfig {
    /// Loads settings from an optional TOML file, then from `CLOCKY_*`
    /// environment variables, which take precedence.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder
            .add_source(Environment::with_prefix("CLOCKY").try_parsing(true))
            .build()
            .context("failed to read clock configuration")?
            .try_deserialize()
            .context("invalid clock configuration")
    }

    /// Parses settings from a TOML document.
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .context("failed to parse clock configuration")?
            .try_deserialize()
            .context("invalid clock configuration")
    }
}

/// Everything `Clock::with_options` can apply: settings plus one optional
/// handler per event.
#[derive(Default)]
pub struct ClockOptions {
    pub config: ClockConfig,
    pub on_start: Option<EventHandler>,
    pub on_pause: Option<EventHandler>,
    pub on_resume: Option<EventHandler>,
    pub on_stop: Option<EventHandler>,
    pub on_tick: Option<EventHandler>,
}

impl From<ClockConfig> for ClockOptions {
    fn from(config: ClockConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_key() {
        let config = ClockConfig::from_toml_str(
            r#"
            tick_every = 2.5
            run_for = 10
            tick_on_start = true
            tick_on_resume = false
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            ClockConfig {
                tick_every: Some(2.5),
                run_for: Some(10.0),
                tick_on_start: Some(true),
                tick_on_resume: Some(false),
            }
        );
    }

    #[test]
    fn missing_keys_stay_unset() {
        let config = ClockConfig::from_toml_str("tick_every = 1").unwrap();
        assert_eq!(config.tick_every, Some(1.0));
        assert_eq!(config.run_for, None);
        assert_eq!(config.tick_on_start, None);
    }

    #[test]
    fn unrecognized_keys_are_ignored() {
        let config = ClockConfig::from_toml_str("label = \"kitchen\"\nrun_for = 3").unwrap();
        assert_eq!(config.run_for, Some(3.0));
    }

    #[test]
    fn rejects_non_numeric_period() {
        assert!(ClockConfig::from_toml_str("tick_every = \"five\"").is_err());
    }
}
