use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::retryable::Command;
use crate::metrics::Metrics;
use crate::retry::{decide, Classify, GiveUpReason, RetryDecision, RetryPolicy};

// ============================================================================
// Command Dispatcher - Retry Loop
// ============================================================================
//
// Runs a command handler, and on failure asks the command (or the default
// policy when the command has no opinion) whether to run it again:
//
//   Attempting(n) ── Ok ──▶ Success
//        │
//       Err(e) ── retry_decision(e, n) ── Retry ──▶ sleep ──▶ Attempting(n+1)
//                                      └─ GiveUp ─▶ Failed / PermanentFailure
//
// The handler gets the attempt number so it can reload state on retries.
// Dropping the returned future cancels any pending backoff.
//
// ============================================================================

/// Result of a dispatched command
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded
    Success { value: T, attempts: u32 },
    /// Operation failed after all retries
    Failed { error: E, attempts: u32 },
    /// Operation permanently failed (should not retry)
    PermanentFailure { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    /// Number of times the handler ran
    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. }
            | RetryResult::Failed { attempts, .. }
            | RetryResult::PermanentFailure { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success { .. })
    }

    /// The value, or the last error unchanged
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success { value, .. } => Ok(value),
            RetryResult::Failed { error, .. } | RetryResult::PermanentFailure { error, .. } => {
                Err(error)
            }
        }
    }
}

pub struct CommandDispatcher {
    default_policy: Arc<dyn RetryPolicy>,
    metrics: Option<Arc<Metrics>>,
}

impl CommandDispatcher {
    pub fn new(default_policy: Arc<dyn RetryPolicy>) -> Self {
        Self {
            default_policy,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn default_policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.default_policy
    }

    /// Decide what follows the failed `attempt` of `command`
    pub fn decide<C>(&self, command: &C, error: &dyn Classify, attempt: u32) -> RetryDecision
    where
        C: Command + ?Sized,
    {
        match command.as_retryable() {
            Some(retryable) => retryable.retry_decision(error, attempt),
            None => decide(self.default_policy.as_ref(), error, attempt),
        }
    }

    /// Execute `operation` for `command`, retrying per the command's policy
    pub async fn dispatch<C, F, Fut, T, E>(&self, command: &C, mut operation: F) -> RetryResult<T, E>
    where
        C: Command + ?Sized,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let name = command.command_name();
        let mut attempt = 0;

        loop {
            tracing::debug!(command = name, attempt = attempt, "Attempting command");
            if let Some(metrics) = &self.metrics {
                metrics.record_retry_attempt(name, attempt);
            }

            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            command = name,
                            attempt = attempt,
                            "Command succeeded after retry"
                        );
                    }
                    if let Some(metrics) = &self.metrics {
                        metrics.record_retry_success(name);
                    }
                    return RetryResult::Success {
                        value,
                        attempts: attempt + 1,
                    };
                }
                Err(error) => error,
            };

            match self.decide(command, &error, attempt) {
                RetryDecision::Retry { next_attempt, delay } => {
                    tracing::warn!(
                        command = name,
                        attempt = attempt,
                        error = %error,
                        error_kind = ?error.error_kind(),
                        delay_ms = delay_millis(delay),
                        "Command failed, retrying after delay"
                    );

                    sleep(delay).await;
                    attempt = next_attempt;
                }
                RetryDecision::GiveUp(reason) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_retry_failure(name, reason.as_str());
                    }
                    let attempts = attempt + 1;

                    return match reason {
                        GiveUpReason::NonRetryable => {
                            tracing::error!(
                                command = name,
                                attempts = attempts,
                                error = %error,
                                error_kind = ?error.error_kind(),
                                "Permanent failure detected, not retrying"
                            );
                            RetryResult::PermanentFailure { error, attempts }
                        }
                        GiveUpReason::Exhausted => {
                            tracing::error!(
                                command = name,
                                attempts = attempts,
                                error = %error,
                                "Command failed after all retries"
                            );
                            RetryResult::Failed { error, attempts }
                        }
                    };
                }
            }
        }
    }
}

/// Delay as a log field, saturating past `u64::MAX` ms
fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("default_policy", &self.default_policy)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
