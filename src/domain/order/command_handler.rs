use std::sync::Arc;
use uuid::Uuid;

use crate::command::{CommandDispatcher, RetryResult};
use crate::event_sourcing::{AggregateId, AggregateRoot, EventStore};

use super::aggregate::OrderAggregate;
use super::commands::OrderCommand;
use super::errors::OrderCommandError;
use super::value_objects::OrderId;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Event Store
//
// Each call loads a fresh root, so a retried command always runs against the
// latest stored version.
//
// ============================================================================

pub struct OrderCommandHandler<S: EventStore> {
    event_store: Arc<S>,
}

impl<S: EventStore> OrderCommandHandler<S> {
    pub fn new(event_store: Arc<S>) -> Self {
        Self { event_store }
    }

    /// Handle a command and persist resulting events.
    ///
    /// Returns the stream version after the append.
    pub async fn handle(
        &self,
        order_id: OrderId,
        command: &OrderCommand,
        correlation_id: Uuid,
    ) -> Result<u64, OrderCommandError> {
        let mut root = self.load_for(order_id, command).await?;

        let recorded = root.execute(command)?;
        let version = self.event_store.save(&mut root, correlation_id).await?;

        tracing::debug!(
            order_id = %order_id,
            command = ?command,
            recorded = recorded,
            version = version,
            "Order command handled"
        );

        Ok(version)
    }

    /// Handle a command through `dispatcher`, retrying per the command's policy
    pub async fn handle_with_retry(
        &self,
        dispatcher: &CommandDispatcher,
        order_id: OrderId,
        command: &OrderCommand,
        correlation_id: Uuid,
    ) -> RetryResult<u64, OrderCommandError> {
        dispatcher
            .dispatch(command, move |attempt| async move {
                if attempt > 0 {
                    tracing::debug!(order_id = %order_id, attempt = attempt, "Reloading order for retry");
                }
                self.handle(order_id, command, correlation_id).await
            })
            .await
    }

    /// Current state of an order
    pub async fn load(&self, order_id: OrderId) -> Result<AggregateRoot<OrderAggregate>, OrderCommandError> {
        Ok(self.event_store.load::<OrderAggregate>(&order_id).await?)
    }

    async fn load_for(
        &self,
        order_id: OrderId,
        command: &OrderCommand,
    ) -> Result<AggregateRoot<OrderAggregate>, OrderCommandError> {
        // For CreateOrder, we don't have existing aggregate
        if matches!(command, OrderCommand::CreateOrder { .. })
            && !self.event_store.aggregate_exists(order_id.identity()).await?
        {
            return Ok(AggregateRoot::new(order_id));
        }

        self.load(order_id).await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
