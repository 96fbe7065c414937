use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use aggregate_kernel::command::{CommandDispatcher, RetryResult};
use aggregate_kernel::domain::order::{
    CustomerId, OrderAggregate, OrderCommand, OrderCommandHandler, OrderId, OrderItem,
};
use aggregate_kernel::event_sourcing::{AggregateId, EventStore, InMemoryEventStore};
use aggregate_kernel::metrics::Metrics;
use aggregate_kernel::retry::RetryConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,aggregate_kernel=debug")),
        )
        .init();

    tracing::info!("Starting aggregate kernel demo");

    // === 1. Retry policy from RETRY_* environment variables ===
    let config = RetryConfig::from_env()?;
    let policy = config.build_policy()?;
    tracing::info!(?policy, "Default retry policy loaded");

    // === 2. Metrics, store, dispatcher ===
    let metrics = Arc::new(Metrics::new()?);
    let store = Arc::new(InMemoryEventStore::new().with_metrics(metrics.clone()));
    let dispatcher = CommandDispatcher::new(Arc::new(policy)).with_metrics(metrics.clone());
    let handler = OrderCommandHandler::new(store.clone());

    // === 3. Demonstrate full order lifecycle ===
    let order_id = OrderId::generate();
    let correlation_id = Uuid::new_v4();
    let lifecycle = [
        OrderCommand::CreateOrder {
            customer_id: CustomerId::generate(),
            items: vec![OrderItem::new(Uuid::new_v4(), 2), OrderItem::new(Uuid::new_v4(), 1)],
        },
        OrderCommand::UpdateItems {
            items: vec![OrderItem::new(Uuid::new_v4(), 5)],
            reason: Some("Customer changed quantity".to_string()),
        },
        OrderCommand::ConfirmOrder,
        OrderCommand::ShipOrder {
            tracking_number: "TRACK-0001".to_string(),
            carrier: "DHL".to_string(),
        },
        OrderCommand::DeliverOrder { signature: None },
    ];

    for command in &lifecycle {
        let version = handler
            .handle_with_retry(&dispatcher, order_id, command, correlation_id)
            .await
            .into_result()?;
        tracing::info!(order_id = %order_id, version = version, command = ?command, "Order updated");
    }

    // === 4. A rejected command is not retried ===
    let cancel = OrderCommand::CancelOrder {
        reason: Some("Too late".to_string()),
        cancelled_by: None,
    };
    if let RetryResult::PermanentFailure { error, attempts } = handler
        .handle_with_retry(&dispatcher, order_id, &cancel, correlation_id)
        .await
    {
        tracing::info!(error = %error, attempts = attempts, "Cancellation rejected as expected");
    }

    // === 5. A stale writer hits the optimistic concurrency check ===
    let second_id = OrderId::generate();
    handler
        .handle(
            second_id,
            &OrderCommand::CreateOrder {
                customer_id: CustomerId::generate(),
                items: vec![OrderItem::new(Uuid::new_v4(), 1)],
            },
            correlation_id,
        )
        .await?;

    let mut first = store.load::<OrderAggregate>(&second_id).await?;
    let mut second = store.load::<OrderAggregate>(&second_id).await?;
    first.execute(&OrderCommand::ConfirmOrder)?;
    second.execute(&OrderCommand::ConfirmOrder)?;
    store.save(&mut first, correlation_id).await?;
    if let Err(error) = store.save(&mut second, correlation_id).await {
        tracing::info!(error = %error, "Stale writer rejected, a retry would reload");
    }

    let order = handler.load(order_id).await?;
    tracing::info!(
        order_id = %order_id,
        version = order.version(),
        status = ?order.state().status,
        stored_events = store.current_version(order_id.identity()).await?,
        "Demo complete"
    );

    println!("{}", metrics.render()?);

    Ok(())
}
