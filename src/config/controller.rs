//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_lookup, var_or_default, var_or_default_bool, var_or_default_str};
use crate::constants::{
    DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_START_MS, DEFAULT_OPERATION_TIMEOUT_SECS,
    DEFAULT_TRANSIENT_MAX_ATTEMPTS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Deadline applied to each remote call (seconds)
    pub operation_timeout_secs: u64,
    /// Attempts for an operation failing with a transient error, first one included
    pub transient_max_attempts: u32,
    /// Fibonacci backoff starting value (milliseconds)
    pub backoff_start_ms: u64,
    /// Fibonacci backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            transient_max_attempts: DEFAULT_TRANSIENT_MAX_ATTEMPTS,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            log_level: "INFO".to_string(),
            enable_metrics: true,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            operation_timeout_secs: var_or_default(
                &lookup,
                "OPERATION_TIMEOUT_SECS",
                DEFAULT_OPERATION_TIMEOUT_SECS,
            ),
            transient_max_attempts: var_or_default(
                &lookup,
                "TRANSIENT_MAX_ATTEMPTS",
                DEFAULT_TRANSIENT_MAX_ATTEMPTS,
            )
            .max(1),
            backoff_start_ms: var_or_default(&lookup, "BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: var_or_default(&lookup, "BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            log_level: var_or_default_str(&lookup, "LOG_LEVEL", "INFO"),
            enable_metrics: var_or_default_bool(&lookup, "ENABLE_METRICS", true),
        }
    }

    /// Get the per-call deadline
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Get backoff start duration
    #[must_use]
    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    /// Get backoff max duration
    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Directive for `tracing_subscriber::EnvFilter` derived from `log_level`
    #[must_use]
    pub fn log_directive(&self) -> String {
        format!("extension_controller={}", self.log_level.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ControllerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.operation_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_directive(), "extension_controller=info");
    }

    #[test]
    fn test_overrides() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("OPERATION_TIMEOUT_SECS", "5"),
            ("TRANSIENT_MAX_ATTEMPTS", "7"),
            ("BACKOFF_START_MS", "10"),
            ("BACKOFF_MAX_MS", "100"),
            ("LOG_LEVEL", "DEBUG"),
            ("ENABLE_METRICS", "off"),
        ]));

        assert_eq!(config.operation_timeout_secs, 5);
        assert_eq!(config.transient_max_attempts, 7);
        assert_eq!(config.backoff_start_duration(), Duration::from_millis(10));
        assert_eq!(config.backoff_max_duration(), Duration::from_millis(100));
        assert_eq!(config.log_directive(), "extension_controller=debug");
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("OPERATION_TIMEOUT_SECS", "soon"),
            ("TRANSIENT_MAX_ATTEMPTS", "0"),
        ]));

        assert_eq!(config.operation_timeout_secs, DEFAULT_OPERATION_TIMEOUT_SECS);
        // At least one attempt is always made
        assert_eq!(config.transient_max_attempts, 1);
    }
}
