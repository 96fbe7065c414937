use std::sync::Arc;

use crate::retry::{Classify, GiveUpReason, RetryDecision, RetryPolicy};
use crate::retry::policy::has_attempts_left;

// ============================================================================
// Command Contracts
// ============================================================================

/// Anything the dispatcher can run
pub trait Command: Send + Sync {
    /// Name used in logs and metrics labels
    fn command_name(&self) -> &'static str;

    /// Retry preferences of this command, `None` to use the dispatcher default
    fn as_retryable(&self) -> Option<&dyn RetryableCommand> {
        None
    }
}

/// A command that carries its own retry behaviour
pub trait RetryableCommand: Send + Sync {
    fn retry_policy(&self) -> Arc<dyn RetryPolicy>;

    /// Command-specific classification on top of `policy`'s
    fn should_retry_under(&self, policy: &dyn RetryPolicy, error: &dyn Classify) -> bool {
        policy.is_retryable_error(error)
    }

    fn should_retry_for_error(&self, error: &dyn Classify) -> bool {
        self.should_retry_under(self.retry_policy().as_ref(), error)
    }

    fn max_retry_attempts(&self) -> u32 {
        self.retry_policy().max_attempts()
    }

    /// What follows the failed `attempt` of this command
    fn retry_decision(&self, error: &dyn Classify, attempt: u32) -> RetryDecision {
        let policy = self.retry_policy();

        if !self.should_retry_under(policy.as_ref(), error) {
            return RetryDecision::GiveUp(GiveUpReason::NonRetryable);
        }
        if !has_attempts_left(policy.max_attempts(), attempt) {
            return RetryDecision::GiveUp(GiveUpReason::Exhausted);
        }

        let next_attempt = attempt + 1;
        RetryDecision::Retry {
            next_attempt,
            delay: policy.retry_delay(next_attempt),
        }
    }
}
