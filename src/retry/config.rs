use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error_kind::ErrorKind;
use super::policy::ExponentialBackoffPolicy;
use crate::event_sourcing::KernelError;

// ============================================================================
// Retry Configuration
// ============================================================================
//
// Plain, deserializable settings for an exponential backoff policy. Loaded
// once at startup (defaults, presets or environment) and turned into an
// immutable ExponentialBackoffPolicy.
//
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Maximum delay between retries
    pub max_delay_ms: u64,
    /// Fraction of the delay used as symmetric random spread (0.0-1.0)
    pub jitter_fraction: f64,
    /// Error kinds worth retrying (descendants included)
    pub retryable_errors: Vec<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            multiplier: 2.0,
            max_delay_ms: 10_000,
            jitter_fraction: 0.1,
            retryable_errors: vec![ErrorKind::Transient],
        }
    }
}

impl RetryConfig {
    pub const ENV_MAX_ATTEMPTS: &'static str = "RETRY_MAX_ATTEMPTS";
    pub const ENV_BASE_DELAY_MS: &'static str = "RETRY_BASE_DELAY_MS";
    pub const ENV_MULTIPLIER: &'static str = "RETRY_MULTIPLIER";
    pub const ENV_MAX_DELAY_MS: &'static str = "RETRY_MAX_DELAY_MS";
    pub const ENV_JITTER: &'static str = "RETRY_JITTER";

    /// Create a retry config for high-value operations (more retries)
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 30_000,
            ..Self::default()
        }
    }

    /// Create a retry config for quick failures (fewer retries)
    pub fn conservative() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            ..Self::default()
        }
    }

    /// Defaults overridden by `RETRY_*` environment variables
    pub fn from_env() -> Result<Self, KernelError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `RETRY_*` key
    pub fn from_lookup<F>(lookup: F) -> Result<Self, KernelError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(Self::ENV_MAX_ATTEMPTS) {
            config.max_attempts = parse_var(Self::ENV_MAX_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(Self::ENV_BASE_DELAY_MS) {
            config.base_delay_ms = parse_var(Self::ENV_BASE_DELAY_MS, &value)?;
        }
        if let Some(value) = lookup(Self::ENV_MULTIPLIER) {
            config.multiplier = parse_var(Self::ENV_MULTIPLIER, &value)?;
        }
        if let Some(value) = lookup(Self::ENV_MAX_DELAY_MS) {
            config.max_delay_ms = parse_var(Self::ENV_MAX_DELAY_MS, &value)?;
        }
        if let Some(value) = lookup(Self::ENV_JITTER) {
            config.jitter_fraction = parse_var(Self::ENV_JITTER, &value)?;
        }

        Ok(config)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Validate and build the policy
    pub fn build_policy(&self) -> Result<ExponentialBackoffPolicy, KernelError> {
        ExponentialBackoffPolicy::from_config(self)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, KernelError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| KernelError::InvalidRetryPolicy(format!("{key}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_presets() {
        assert_eq!(RetryConfig::aggressive().max_attempts, 5);
        assert_eq!(RetryConfig::conservative().max_attempts, 2);
        assert_eq!(RetryConfig::default().retryable_errors, vec![ErrorKind::Transient]);
    }

    #[test]
    fn test_lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("RETRY_MAX_ATTEMPTS", "7"),
            ("RETRY_BASE_DELAY_MS", "250"),
            ("RETRY_JITTER", "0"),
        ]
        .into_iter()
        .collect();

        let config = RetryConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.base_delay(), Duration::from_millis(250));
        assert_eq!(config.jitter_fraction, 0.0);
        assert_eq!(config.multiplier, 2.0);
        assert_eq!(config.max_delay_ms, 10_000);
    }

    #[test]
    fn test_unparseable_value_rejected() {
        let err = RetryConfig::from_lookup(|key| {
            (key == "RETRY_MULTIPLIER").then(|| "fast".to_string())
        })
        .unwrap_err();

        assert!(matches!(err, KernelError::InvalidRetryPolicy(ref msg) if msg.contains("RETRY_MULTIPLIER")));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: RetryConfig = serde_json::from_str(
            r#"{"max_attempts": 4, "retryable_errors": ["connection", "concurrency_conflict"]}"#,
        )
        .unwrap();

        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.base_delay_ms, 100);
        assert_eq!(
            config.retryable_errors,
            vec![ErrorKind::Connection, ErrorKind::ConcurrencyConflict]
        );
    }
}
