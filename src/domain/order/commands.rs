use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::value_objects::{CustomerId, OrderItem};
use crate::command::{Command, RetryableCommand};
use crate::retry::{Classify, ErrorKind, ExponentialBackoffPolicy, NoRetryPolicy, RetryPolicy};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================
//
// Retry preferences:
// - ShipOrder: aggressive backoff, but never after a timeout (the carrier may
//   already have accepted the shipment)
// - CancelOrder: never retried automatically
// - everything else: dispatcher default
//
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    CreateOrder {
        customer_id: CustomerId,
        items: Vec<OrderItem>,
    },
    UpdateItems {
        items: Vec<OrderItem>,
        reason: Option<String>,
    },
    ConfirmOrder,
    ShipOrder {
        tracking_number: String,
        carrier: String,
    },
    DeliverOrder {
        signature: Option<String>,
    },
    CancelOrder {
        reason: Option<String>,
        cancelled_by: Option<Uuid>,
    },
}

impl Command for OrderCommand {
    fn command_name(&self) -> &'static str {
        match self {
            OrderCommand::CreateOrder { .. } => "CreateOrder",
            OrderCommand::UpdateItems { .. } => "UpdateItems",
            OrderCommand::ConfirmOrder => "ConfirmOrder",
            OrderCommand::ShipOrder { .. } => "ShipOrder",
            OrderCommand::DeliverOrder { .. } => "DeliverOrder",
            OrderCommand::CancelOrder { .. } => "CancelOrder",
        }
    }

    fn as_retryable(&self) -> Option<&dyn RetryableCommand> {
        match self {
            OrderCommand::ShipOrder { .. } | OrderCommand::CancelOrder { .. } => Some(self),
            _ => None,
        }
    }
}

impl RetryableCommand for OrderCommand {
    fn retry_policy(&self) -> Arc<dyn RetryPolicy> {
        match self {
            OrderCommand::CancelOrder { .. } => Arc::new(NoRetryPolicy),
            // Same shape as RetryConfig::aggressive()
            _ => Arc::new(
                ExponentialBackoffPolicy::default()
                    .with_max_attempts(5)
                    .with_base_delay(Duration::from_millis(50))
                    .with_max_delay(Duration::from_secs(30)),
            ),
        }
    }

    fn should_retry_under(&self, policy: &dyn RetryPolicy, error: &dyn Classify) -> bool {
        match self {
            OrderCommand::ShipOrder { .. } if error.error_kind() == ErrorKind::Timeout => false,
            _ => policy.is_retryable_error(error),
        }
    }
}
