use crate::retry::{Classify, ErrorKind};

// ============================================================================
// Kernel Errors
// ============================================================================
//
// Errors raised by the generic event sourcing infrastructure itself.
// Business rule violations and event application failures belong to each
// aggregate's own error type and are propagated unchanged.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("Invalid {kind} id `{value}`: {reason}")]
    InvalidAggregateId {
        kind: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unknown event type `{event_type}` for {aggregate_type}, expected one of {expected:?}")]
    UnknownEventType {
        aggregate_type: &'static str,
        event_type: String,
        expected: &'static [&'static str],
    },

    #[error("Aggregate {0} is corrupted by a failed event application and must be discarded")]
    AggregateCorrupted(String),

    #[error("Concurrency conflict on {aggregate}: expected version {expected}, but current is {actual} (reload and retry)")]
    ConcurrencyConflict {
        aggregate: String,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to replay {aggregate}: {source}")]
    Replay {
        aggregate: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Aggregate not found: {0}")]
    AggregateNotFound(String),

    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(String),
}

impl Classify for KernelError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            KernelError::InvalidAggregateId { .. } => ErrorKind::InvalidIdentity,
            KernelError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            KernelError::AggregateCorrupted(_) | KernelError::Replay { .. } => {
                ErrorKind::EventApplication
            }
            KernelError::UnknownEventType { .. }
            | KernelError::Serialization(_)
            | KernelError::InvalidRetryPolicy(_) => ErrorKind::Validation,
            KernelError::AggregateNotFound(_) => ErrorKind::Permanent,
        }
    }
}
