use super::value_objects::OrderStatus;
use crate::event_sourcing::KernelError;
use crate::retry::{Classify, ErrorKind};

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order is already cancelled")]
    AlreadyCancelled,

    #[error("Order is already confirmed")]
    AlreadyConfirmed,

    #[error("Order must be confirmed before shipping")]
    NotConfirmed,

    #[error("Order must be shipped before delivery")]
    NotShipped,

    #[error("Cannot modify order in status: {0:?}")]
    InvalidStatusTransition(OrderStatus),

    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(i32),

    // Apply-time failures: the event stream itself is inconsistent
    #[error("Order already created")]
    AlreadyCreated,

    #[error("Aggregate not initialized")]
    NotInitialized,
}

impl Classify for OrderError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            OrderError::AlreadyCreated | OrderError::NotInitialized => ErrorKind::EventApplication,
            OrderError::EmptyItems | OrderError::InvalidQuantity(_) => ErrorKind::Validation,
            _ => ErrorKind::BusinessRule,
        }
    }
}

/// Everything an order command can fail with, end to end
#[derive(Debug, thiserror::Error)]
pub enum OrderCommandError {
    #[error("Command rejected: {0}")]
    Rejected(#[from] OrderError),

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

impl Classify for OrderCommandError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            OrderCommandError::Rejected(e) => e.error_kind(),
            OrderCommandError::Kernel(e) => e.error_kind(),
        }
    }
}
