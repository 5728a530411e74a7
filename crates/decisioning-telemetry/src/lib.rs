//! Tracing subscriber setup for hosts embedding the decisioning engine.
//!
//! The engine only emits `tracing` events. Without an installed subscriber
//! those events are dropped, so logging is opt-in for the host.

#![deny(unsafe_code)]

use std::str::FromStr;

use decisioning_settings::LoggingSettings;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log level: {0}")]
    InvalidLevel(String),
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by `RUST_LOG`.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "decisioning_artifact" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// JSON lines instead of the human-readable formatter.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl TryFrom<&LoggingSettings> for TelemetryConfig {
    type Error = TelemetryError;

    fn try_from(settings: &LoggingSettings) -> Result<Self, Self::Error> {
        let log_level = parse_level(&settings.level)?;
        let module_levels = settings
            .module_levels
            .iter()
            .map(|(module, level)| Ok((module.clone(), parse_level(level)?)))
            .collect::<Result<Vec<_>, TelemetryError>>()?;
        Ok(Self {
            log_level,
            module_levels,
            json: settings.json,
        })
    }
}

impl TelemetryConfig {
    /// Directive string understood by [`EnvFilter`].
    pub fn filter_directives(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

fn parse_level(raw: &str) -> Result<Level, TelemetryError> {
    Level::from_str(raw.trim()).map_err(|_| TelemetryError::InvalidLevel(raw.to_string()))
}

/// Install the global subscriber. Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let json_layer = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
    });
    let plain_layer = (!config.json).then(|| tracing_subscriber::fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(plain_layer)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_info() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.filter_directives(), "info");
    }

    #[test]
    fn from_logging_settings() {
        let mut settings = LoggingSettings::default();
        settings.level = "WARN".into();
        settings.json = true;
        let _ = settings
            .module_levels
            .insert("decisioning_artifact".into(), "debug".into());

        let config = TelemetryConfig::try_from(&settings).unwrap();
        assert_eq!(config.log_level, Level::WARN);
        assert!(config.json);
        assert_eq!(config.filter_directives(), "warn,decisioning_artifact=debug");
    }

    #[test]
    fn invalid_level_rejected() {
        let mut settings = LoggingSettings::default();
        settings.level = "loud".into();
        let err = TelemetryConfig::try_from(&settings).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidLevel(ref l) if l == "loud"));
    }

    #[test]
    fn second_init_reports_already_initialized() {
        let config = TelemetryConfig::default();
        let _ = init_telemetry(&config);
        let second = init_telemetry(&config);
        assert!(matches!(second, Err(TelemetryError::AlreadyInitialized(_))));
    }
}
