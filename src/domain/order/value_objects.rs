use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================

crate::define_aggregate_id!(OrderId, "order");
crate::define_aggregate_id!(CustomerId, "customer");

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl OrderItem {
    pub fn new(product_id: Uuid, quantity: i32) -> Self {
        Self { product_id, quantity }
    }
}

/// Lifecycle position of an order. `Draft` until the creation event is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Draft,
    Created,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// No further transitions possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
