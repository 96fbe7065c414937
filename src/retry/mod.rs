// ============================================================================
// Retry Engine
// ============================================================================
//
// Policy-driven exponential backoff with jitter and error classification.
// Decides whether and when a failed command may run again; waiting is left
// to the caller (see command::CommandDispatcher).
//
// ============================================================================

pub mod config;
pub mod error_kind;
pub mod jitter;
pub mod policy;

pub use config::RetryConfig;
pub use error_kind::{Classify, ErrorKind};
pub use jitter::{JitterSource, SeededJitter, ThreadRngJitter};
pub use policy::{
    decide, ExponentialBackoffPolicy, GiveUpReason, NoRetryPolicy, RetryDecision, RetryPolicy,
};
