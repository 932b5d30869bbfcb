//! Configuration for the distributor.
//!
//! Configuration is loaded from a JSON file whose path is given as the
//! process's first CLI argument (falling back to `local_config.json`).
//! Loading is followed by explicit field-level validation, the same shape
//! as the project's original environment-variable config loader: parse,
//! then validate, producing a [`ConfigError`] that names the offending
//! field rather than a generic parse failure.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default path used when no config path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "local_config.json";

/// Default cap on concurrently in-flight dispatch tasks.
const DEFAULT_FAN_OUT_CONCURRENCY: usize = 10;

/// Default interval between retry-queue cycles.
const DEFAULT_QUEUE_CYCLE_SECS: u64 = 2;

/// Per-attempt timeout used when a sink configures `timeout: 0`.
pub const FALLBACK_TIMEOUT_MS: u64 = 10_000;

/// One configured backend sink, as it appears in the JSON config file.
///
/// `enabled` is accepted for backward compatibility with an older config
/// variant that filtered disabled sinks out of selection. The current
/// distributor deserializes it but never reads it: every configured sink
/// is eligible for selection regardless of this field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub id: String,
    pub weight: f64,
    pub endpoint: String,
    pub timeout: u64,
    pub retry_count: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout(timeout_ms: u64) -> Duration {
    if timeout_ms == 0 {
        Duration::from_millis(FALLBACK_TIMEOUT_MS)
    } else {
        Duration::from_millis(timeout_ms)
    }
}

/// A validated, immutable sink descriptor used by the selector and dispatcher.
///
/// Built from a [`SinkConfig`] once at startup; `timeout` has already had the
/// zero-means-fallback substitution applied so downstream code never has to
/// repeat that check.
#[derive(Debug, Clone)]
pub struct SinkDescriptor {
    pub id: String,
    pub weight: f64,
    pub endpoint: String,
    pub timeout: Duration,
    pub retry_count: u32,
}

impl From<&SinkConfig> for SinkDescriptor {
    fn from(cfg: &SinkConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            weight: cfg.weight,
            endpoint: cfg.endpoint.clone(),
            timeout: default_timeout(cfg.timeout),
            retry_count: cfg.retry_count,
        }
    }
}

/// Raw JSON shape of the config file, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConfig {
    port: i64,
    analyzers: Vec<SinkConfig>,
}

/// Validated, immutable runtime configuration for the distributor process.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub sinks: Vec<SinkDescriptor>,
    pub total_weight: f64,
    pub fan_out_concurrency: usize,
    pub queue_cycle_interval: Duration,
}

/// Error loading or validating the configuration file.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub field: Option<String>,
}

impl ConfigError {
    fn new(message: impl Into<String>, field: Option<&str>) -> Self {
        Self {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "configuration error for '{}': {}", field, self.message),
            None => write!(f, "configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load and validate configuration from a JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, does not parse as
    /// the expected schema, or fails validation (non-positive port, empty
    /// sink list, non-positive total weight, or any sink with non-positive
    /// weight).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigError::new(format!("failed to read {}: {}", path.display(), e), None)
        })?;

        let raw: RawConfig = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::new(format!("invalid JSON: {}", e), None))?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.port <= 0 || raw.port > i64::from(u16::MAX) {
            return Err(ConfigError::new(
                format!("port must be a positive 16-bit value, got {}", raw.port),
                Some("port"),
            ));
        }

        if raw.analyzers.is_empty() {
            return Err(ConfigError::new(
                "at least one analyzer must be configured",
                Some("analyzers"),
            ));
        }

        for sink in &raw.analyzers {
            if sink.weight <= 0.0 {
                return Err(ConfigError::new(
                    format!("analyzer '{}' has non-positive weight {}", sink.id, sink.weight),
                    Some("analyzers[].weight"),
                ));
            }
        }

        let sinks: Vec<SinkDescriptor> = raw.analyzers.iter().map(SinkDescriptor::from).collect();
        let total_weight: f64 = sinks.iter().map(|s| s.weight).sum();

        if total_weight <= 0.0 {
            return Err(ConfigError::new(
                "total analyzer weight must be greater than zero",
                Some("analyzers"),
            ));
        }

        Ok(Self {
            port: raw.port as u16,
            sinks,
            total_weight,
            fan_out_concurrency: DEFAULT_FAN_OUT_CONCURRENCY,
            queue_cycle_interval: Duration::from_secs(DEFAULT_QUEUE_CYCLE_SECS),
        })
    }

    /// Resolve the config path from CLI arguments, defaulting to
    /// [`DEFAULT_CONFIG_PATH`] when no positional argument is given.
    pub fn path_from_args(mut args: impl Iterator<Item = String>) -> String {
        args.next(); // skip argv[0]
        args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(id: &str, weight: f64) -> SinkConfig {
        SinkConfig {
            id: id.to_string(),
            weight,
            endpoint: format!("http://localhost/{}", id),
            timeout: 1000,
            retry_count: 3,
            enabled: true,
        }
    }

    #[test]
    fn valid_config_parses_and_validates() {
        let raw = RawConfig {
            port: 8080,
            analyzers: vec![sink("a", 1.0), sink("b", 2.0)],
        };
        let config = Config::from_raw(raw).expect("should validate");
        assert_eq!(config.port, 8080);
        assert_eq!(config.sinks.len(), 2);
        assert!((config.total_weight - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_non_positive_port() {
        let raw = RawConfig {
            port: 0,
            analyzers: vec![sink("a", 1.0)],
        };
        let err = Config::from_raw(raw).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("port"));
    }

    #[test]
    fn rejects_empty_sink_list() {
        let raw = RawConfig {
            port: 8080,
            analyzers: vec![],
        };
        let err = Config::from_raw(raw).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("analyzers"));
    }

    #[test]
    fn rejects_non_positive_sink_weight() {
        let raw = RawConfig {
            port: 8080,
            analyzers: vec![sink("a", 0.0)],
        };
        let err = Config::from_raw(raw).unwrap_err();
        assert!(err.message.contains("non-positive weight"));
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let mut cfg = sink("a", 1.0);
        cfg.timeout = 0;
        let descriptor = SinkDescriptor::from(&cfg);
        assert_eq!(descriptor.timeout, Duration::from_millis(FALLBACK_TIMEOUT_MS));
    }

    #[test]
    fn enabled_field_defaults_true_when_absent() {
        let json = r#"{"id":"a","weight":1.0,"endpoint":"http://x","timeout":1000,"retry_count":3}"#;
        let cfg: SinkConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.enabled);
    }

    #[test]
    fn config_error_display_includes_field_when_present() {
        let err = ConfigError::new("bad value", Some("port"));
        assert_eq!(err.to_string(), "configuration error for 'port': bad value");

        let err = ConfigError::new("bad value", None);
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn path_from_args_uses_first_positional_or_default() {
        let args = vec!["bin".to_string(), "custom.json".to_string()].into_iter();
        assert_eq!(Config::path_from_args(args), "custom.json");

        let args = vec!["bin".to_string()].into_iter();
        assert_eq!(Config::path_from_args(args), DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn from_file_reports_read_error_for_missing_path() {
        let err = Config::from_file("/nonexistent/path/to/config.json").unwrap_err();
        assert!(err.message.contains("failed to read"));
    }
}
