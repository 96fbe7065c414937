use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::config::RetryConfig;
use super::error_kind::{Classify, ErrorKind};
use super::jitter::{JitterSource, ThreadRngJitter};
use crate::event_sourcing::KernelError;

// ============================================================================
// Retry Policies
// ============================================================================
//
// A policy answers two questions about a failed attempt: may it be retried,
// and after how long. Attempts are numbered from 0; the dispatcher asks
// `should_retry(error, n)` after attempt n fails and waits `retry_delay(n + 1)`
// before running attempt n + 1. Policies never sleep themselves.
//
// ============================================================================

pub trait RetryPolicy: fmt::Debug + Send + Sync {
    /// May attempt `attempt + 1` follow the failed attempt `attempt`?
    fn should_retry(&self, error: &dyn Classify, attempt: u32) -> bool;

    /// Is the error's kind (or one of its ancestors) registered as retryable?
    fn is_retryable_error(&self, error: &dyn Classify) -> bool;

    /// Wait before running `attempt`. Always zero for attempt 0.
    fn retry_delay(&self, attempt: u32) -> Duration;

    fn max_attempts(&self) -> u32;

    /// Stable identifier for logs and metrics
    fn name(&self) -> &'static str;
}

/// Why a failed command is not run again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// The error kind is not retryable
    NonRetryable,
    /// The attempt budget is spent
    Exhausted,
}

impl GiveUpReason {
    pub fn as_str(self) -> &'static str {
        match self {
            GiveUpReason::NonRetryable => "non_retryable",
            GiveUpReason::Exhausted => "exhausted",
        }
    }
}

/// Outcome of classifying a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { next_attempt: u32, delay: Duration },
    GiveUp(GiveUpReason),
}

/// Decide what follows the failed `attempt` under `policy`
pub fn decide(policy: &dyn RetryPolicy, error: &dyn Classify, attempt: u32) -> RetryDecision {
    if !policy.is_retryable_error(error) {
        return RetryDecision::GiveUp(GiveUpReason::NonRetryable);
    }
    if !policy.should_retry(error, attempt) {
        return RetryDecision::GiveUp(GiveUpReason::Exhausted);
    }

    let next_attempt = attempt + 1;
    RetryDecision::Retry {
        next_attempt,
        delay: policy.retry_delay(next_attempt),
    }
}

/// True while another attempt fits in the budget
pub(crate) fn has_attempts_left(max_attempts: u32, attempt: u32) -> bool {
    attempt.saturating_add(1) < max_attempts
}

// ============================================================================
// Exponential Backoff
// ============================================================================

/// Exponential backoff with symmetric jitter.
///
/// `delay(n) = min(base * multiplier^(n-1), max_delay) ± jitter_fraction`,
/// clamped at zero. Immutable: every `with_*` returns a modified copy.
#[derive(Clone)]
pub struct ExponentialBackoffPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    jitter_fraction: f64,
    retryable_errors: BTreeSet<ErrorKind>,
    jitter: Arc<dyn JitterSource>,
}

impl ExponentialBackoffPolicy {
    pub const NAME: &'static str = "exponential_backoff";

    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
        jitter_fraction: f64,
    ) -> Result<Self, KernelError> {
        if max_attempts == 0 {
            return Err(KernelError::InvalidRetryPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !(multiplier >= 1.0 && multiplier.is_finite()) {
            return Err(KernelError::InvalidRetryPolicy(format!(
                "multiplier must be a finite value >= 1.0, got {multiplier}"
            )));
        }
        if !(0.0..=1.0).contains(&jitter_fraction) {
            return Err(KernelError::InvalidRetryPolicy(format!(
                "jitter_fraction must be within 0.0..=1.0, got {jitter_fraction}"
            )));
        }

        Ok(Self {
            max_attempts,
            base_delay,
            multiplier,
            max_delay,
            jitter_fraction,
            retryable_errors: BTreeSet::from([ErrorKind::Transient]),
            jitter: Arc::new(ThreadRngJitter),
        })
    }

    pub fn from_config(config: &RetryConfig) -> Result<Self, KernelError> {
        let policy = Self::new(
            config.max_attempts,
            config.base_delay(),
            config.multiplier,
            config.max_delay(),
            config.jitter_fraction,
        )?;
        Ok(policy.with_retryable_errors(config.retryable_errors.iter().copied()))
    }

    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self.clone()
        }
    }

    pub fn with_base_delay(&self, base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..self.clone()
        }
    }

    pub fn with_multiplier(&self, multiplier: f64) -> Self {
        let multiplier = if multiplier.is_finite() { multiplier.max(1.0) } else { 1.0 };
        Self {
            multiplier,
            ..self.clone()
        }
    }

    pub fn with_max_delay(&self, max_delay: Duration) -> Self {
        Self {
            max_delay,
            ..self.clone()
        }
    }

    pub fn with_jitter_fraction(&self, jitter_fraction: f64) -> Self {
        let jitter_fraction = if jitter_fraction.is_nan() {
            0.0
        } else {
            jitter_fraction.clamp(0.0, 1.0)
        };
        Self {
            jitter_fraction,
            ..self.clone()
        }
    }

    /// Replace the retryable set
    pub fn with_retryable_errors<I>(&self, kinds: I) -> Self
    where
        I: IntoIterator<Item = ErrorKind>,
    {
        Self {
            retryable_errors: kinds.into_iter().collect(),
            ..self.clone()
        }
    }

    pub fn with_jitter_source(&self, jitter: Arc<dyn JitterSource>) -> Self {
        Self {
            jitter,
            ..self.clone()
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter_fraction(&self) -> f64 {
        self.jitter_fraction
    }

    pub fn retryable_errors(&self) -> &BTreeSet<ErrorKind> {
        &self.retryable_errors
    }

    /// Backoff before jitter: `min(base * multiplier^(attempt-1), max_delay)`
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let raw = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64());

        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }
}

impl Default for ExponentialBackoffPolicy {
    fn default() -> Self {
        let config = RetryConfig::default();
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            multiplier: config.multiplier,
            max_delay: config.max_delay(),
            jitter_fraction: config.jitter_fraction,
            retryable_errors: config.retryable_errors.into_iter().collect(),
            jitter: Arc::new(ThreadRngJitter),
        }
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    fn should_retry(&self, error: &dyn Classify, attempt: u32) -> bool {
        has_attempts_left(self.max_attempts, attempt) && self.is_retryable_error(error)
    }

    fn is_retryable_error(&self, error: &dyn Classify) -> bool {
        error
            .error_kind()
            .lineage()
            .any(|kind| self.retryable_errors.contains(&kind))
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay(attempt);
        if capped.is_zero() || self.jitter_fraction == 0.0 {
            return capped;
        }

        let capped = capped.as_secs_f64();
        let jittered = capped + self.jitter.offset(capped * self.jitter_fraction);

        // only overflow can fail here, so saturate rather than retry at once
        Duration::try_from_secs_f64(jittered.max(0.0)).unwrap_or(Duration::MAX)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

impl fmt::Debug for ExponentialBackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoffPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("multiplier", &self.multiplier)
            .field("max_delay", &self.max_delay)
            .field("jitter_fraction", &self.jitter_fraction)
            .field("retryable_errors", &self.retryable_errors)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// No Retry
// ============================================================================

/// Policy for commands with retries explicitly disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetryPolicy;

impl NoRetryPolicy {
    pub const NAME: &'static str = "no_retry";
}

impl RetryPolicy for NoRetryPolicy {
    fn should_retry(&self, _error: &dyn Classify, _attempt: u32) -> bool {
        false
    }

    fn is_retryable_error(&self, _error: &dyn Classify) -> bool {
        false
    }

    fn retry_delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }

    fn max_attempts(&self) -> u32 {
        1
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
