// ============================================================================
// Order Domain - Sample Aggregate on the Kernel
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderId, CustomerId, OrderItem, OrderStatus)
// - Events (OrderCreated, OrderConfirmed, etc.)
// - Commands (CreateOrder, ConfirmOrder, etc.) and their retry preferences
// - Errors (OrderError, OrderCommandError)
// - Aggregate (OrderAggregate with business logic)
// - Command Handler (OrderCommandHandler)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
