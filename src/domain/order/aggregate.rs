use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event_sourcing::Aggregate;
use super::value_objects::{CustomerId, OrderId, OrderItem, OrderStatus};
use super::events::*;
use super::commands::OrderCommand;
use super::errors::OrderError;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Pure state: identity, version and the uncommitted buffer live in
// AggregateRoot<OrderAggregate>. State changes only in `apply_event`.
//
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderAggregate {
    // Current State (derived from events)
    pub customer_id: Option<CustomerId>,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,

    // Audit Trail
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,

    // Optional fields
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub cancelled_reason: Option<String>,
}

impl OrderAggregate {
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }

    /// Validate business rules before emitting events
    fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        for item in items {
            if item.quantity <= 0 {
                return Err(OrderError::InvalidQuantity(item.quantity));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for OrderAggregate {
    const AGGREGATE_TYPE: &'static str = "order";

    type Id = OrderId;
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match (event, self.status) {
            (OrderEvent::Created(_), status) if status != OrderStatus::Draft => {
                return Err(OrderError::AlreadyCreated)
            }
            (OrderEvent::Created(_), _) => {}
            (_, OrderStatus::Draft) => return Err(OrderError::NotInitialized),
            _ => {}
        }

        match event {
            OrderEvent::Created(e) => {
                self.customer_id = Some(e.customer_id);
                self.items = e.items.clone();
                self.status = OrderStatus::Created;
                self.created_at = Some(e.created_at);
                self.updated_at = Some(e.created_at);
            }
            OrderEvent::ItemsUpdated(e) => {
                self.items = e.items.clone();
            }
            OrderEvent::Confirmed(e) => {
                self.status = OrderStatus::Confirmed;
                self.updated_at = Some(e.confirmed_at);
            }
            OrderEvent::Shipped(e) => {
                self.status = OrderStatus::Shipped;
                self.tracking_number = Some(e.tracking_number.clone());
                self.carrier = Some(e.carrier.clone());
                self.updated_at = Some(e.shipped_at);
            }
            OrderEvent::Delivered(e) => {
                self.status = OrderStatus::Delivered;
                self.updated_at = Some(e.delivered_at);
            }
            OrderEvent::Cancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.cancelled_reason = e.reason.clone();
            }
        }

        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder { customer_id, items } => {
                if self.status != OrderStatus::Draft {
                    return Err(OrderError::InvalidStatusTransition(self.status));
                }
                Self::validate_items(items)?;

                Ok(vec![OrderEvent::Created(OrderCreated {
                    customer_id: *customer_id,
                    items: items.clone(),
                    created_at: Utc::now(),
                })])
            }

            OrderCommand::UpdateItems { items, reason } => {
                match self.status {
                    OrderStatus::Created => {}
                    OrderStatus::Cancelled => return Err(OrderError::AlreadyCancelled),
                    status => return Err(OrderError::InvalidStatusTransition(status)),
                }
                Self::validate_items(items)?;

                Ok(vec![OrderEvent::ItemsUpdated(OrderItemsUpdated {
                    items: items.clone(),
                    reason: reason.clone(),
                })])
            }

            OrderCommand::ConfirmOrder => {
                match self.status {
                    OrderStatus::Created => {}
                    OrderStatus::Confirmed => return Err(OrderError::AlreadyConfirmed),
                    status => return Err(OrderError::InvalidStatusTransition(status)),
                }

                Ok(vec![OrderEvent::Confirmed(OrderConfirmed {
                    confirmed_at: Utc::now(),
                })])
            }

            OrderCommand::ShipOrder { tracking_number, carrier } => {
                match self.status {
                    OrderStatus::Confirmed => {}
                    OrderStatus::Created => return Err(OrderError::NotConfirmed),
                    status => return Err(OrderError::InvalidStatusTransition(status)),
                }

                Ok(vec![OrderEvent::Shipped(OrderShipped {
                    tracking_number: tracking_number.clone(),
                    carrier: carrier.clone(),
                    shipped_at: Utc::now(),
                })])
            }

            OrderCommand::DeliverOrder { signature } => {
                if self.status != OrderStatus::Shipped {
                    return Err(OrderError::NotShipped);
                }

                Ok(vec![OrderEvent::Delivered(OrderDelivered {
                    delivered_at: Utc::now(),
                    signature: signature.clone(),
                })])
            }

            OrderCommand::CancelOrder { reason, cancelled_by } => {
                match self.status {
                    OrderStatus::Cancelled => return Err(OrderError::AlreadyCancelled),
                    // Can cancel from Created, Confirmed, or Shipped
                    OrderStatus::Created | OrderStatus::Confirmed | OrderStatus::Shipped => {}
                    status => return Err(OrderError::InvalidStatusTransition(status)),
                }

                Ok(vec![OrderEvent::Cancelled(OrderCancelled {
                    reason: reason.clone(),
                    cancelled_by: *cancelled_by,
                })])
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
