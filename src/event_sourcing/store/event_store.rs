use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::event_sourcing::core::{
    Aggregate, AggregateId, AggregateIdentity, AggregateRoot, EventEnvelope, KernelError,
};
use crate::metrics::Metrics;

// ============================================================================
// Event Store - Persistence Contract
// ============================================================================
//
// Responsibilities:
// 1. Refuse to persist corrupted aggregates
// 2. Ensure optimistic concurrency control
// 3. Append the uncommitted events atomically, draining the root once
// 4. Rehydrate aggregates from their stream, failing on unknown event types
//
// Streams are keyed by AggregateIdentity, so ids of different aggregate types
// never share a stream even when the UUIDs match.
//
// ============================================================================

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist the uncommitted events of `root`.
    ///
    /// Returns the new stream version. Saving a root with nothing buffered
    /// is a no-op returning the current version.
    async fn save<A: Aggregate>(
        &self,
        root: &mut AggregateRoot<A>,
        correlation_id: Uuid,
    ) -> Result<u64, KernelError>;

    /// Replay the stream of `id` into a fresh root
    async fn load<A: Aggregate>(&self, id: &A::Id) -> Result<AggregateRoot<A>, KernelError>;

    /// Number of events stored for an aggregate (0 when unknown)
    async fn current_version(&self, identity: AggregateIdentity) -> Result<u64, KernelError>;

    async fn aggregate_exists(&self, identity: AggregateIdentity) -> Result<bool, KernelError> {
        Ok(self.current_version(identity).await? > 0)
    }
}

// ============================================================================
// In-Memory Event Store
// ============================================================================

type Streams = HashMap<AggregateIdentity, Vec<EventEnvelope<String>>>;

/// Event store backed by a map of JSON-encoded streams
#[derive(Default)]
pub struct InMemoryEventStore {
    streams: RwLock<Streams>,
    metrics: Option<Arc<Metrics>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Stored envelopes of one stream, in sequence order
    pub async fn stream(&self, identity: AggregateIdentity) -> Vec<EventEnvelope<String>> {
        self.streams
            .read()
            .await
            .get(&identity)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of events across all streams
    pub async fn event_count(&self) -> usize {
        self.streams.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save<A: Aggregate>(
        &self,
        root: &mut AggregateRoot<A>,
        correlation_id: Uuid,
    ) -> Result<u64, KernelError> {
        let identity = root.id().identity();

        if root.is_corrupted() {
            tracing::error!(aggregate = %identity, "Refusing to save corrupted aggregate");
            return Err(KernelError::AggregateCorrupted(identity.to_string()));
        }

        // Hold the write lock across check and append
        let mut streams = self.streams.write().await;
        let actual = streams.get(&identity).map_or(0, |stream| stream.len() as u64);

        if !root.has_uncommitted_events() {
            return Ok(actual);
        }

        // Check optimistic concurrency
        let expected = root.committed_version();
        if expected != actual {
            tracing::warn!(
                aggregate = %identity,
                expected_version = expected,
                current_version = actual,
                "Concurrency conflict on append"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_concurrency_conflict(A::AGGREGATE_TYPE);
            }
            return Err(KernelError::ConcurrencyConflict {
                aggregate: identity.to_string(),
                expected,
                actual,
            });
        }

        // Encode everything before draining so a serialization failure
        // leaves the root untouched
        let mut encoded = Vec::with_capacity(root.uncommitted_event_count());
        for (offset, event) in root.uncommitted_events().iter().enumerate() {
            let envelope = EventEnvelope::new(
                A::AGGREGATE_TYPE,
                identity.uuid,
                expected + offset as u64 + 1,
                event.clone(),
                correlation_id,
            );
            encoded.push(envelope.encode()?);
        }

        let drained = root.pull_domain_events();
        let new_version = expected + drained.len() as u64;
        streams.entry(identity).or_default().extend(encoded);

        tracing::info!(
            aggregate = %identity,
            new_version = new_version,
            event_count = drained.len(),
            "Appended events to event store"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_events_appended(A::AGGREGATE_TYPE, drained.len());
        }

        Ok(new_version)
    }

    async fn load<A: Aggregate>(&self, id: &A::Id) -> Result<AggregateRoot<A>, KernelError> {
        let identity = id.identity();
        let streams = self.streams.read().await;

        let stream = match streams.get(&identity) {
            Some(stream) if !stream.is_empty() => stream,
            _ => return Err(KernelError::AggregateNotFound(identity.to_string())),
        };

        let events = stream
            .iter()
            .map(|stored| stored.decode::<A::Event>(A::AGGREGATE_TYPE))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(aggregate = %identity, event_count = events.len(), "Loaded events");

        AggregateRoot::<A>::load_from_envelopes(*id, events).map_err(|e| KernelError::Replay {
            aggregate: identity.to_string(),
            source: Box::new(e),
        })
    }

    async fn current_version(&self, identity: AggregateIdentity) -> Result<u64, KernelError> {
        Ok(self
            .streams
            .read()
            .await
            .get(&identity)
            .map_or(0, |stream| stream.len() as u64))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::DomainEvent;
    use serde::{Deserialize, Serialize};

    crate::define_aggregate_id!(LedgerId, "ledger");
    crate::define_aggregate_id!(VaultId, "vault");

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    #[serde(tag = "type", content = "data")]
    enum LedgerEvent {
        Credited(i64),
        Frozen,
    }

    impl DomainEvent for LedgerEvent {
        const EVENT_TYPES: &'static [&'static str] = &["Credited", "Frozen"];

        fn event_type(&self) -> &'static str {
            match self {
                LedgerEvent::Credited(_) => "Credited",
                LedgerEvent::Frozen => "Frozen",
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("ledger is frozen")]
    struct Frozen;

    #[derive(Debug, Default)]
    struct Ledger {
        balance: i64,
        frozen: bool,
    }

    impl Aggregate for Ledger {
        const AGGREGATE_TYPE: &'static str = "ledger";
        type Id = LedgerId;
        type Event = LedgerEvent;
        type Command = i64;
        type Error = Frozen;

        fn apply_event(&mut self, event: &LedgerEvent) -> Result<(), Frozen> {
            if self.frozen {
                return Err(Frozen);
            }
            match event {
                LedgerEvent::Credited(amount) => self.balance += amount,
                LedgerEvent::Frozen => self.frozen = true,
            }
            Ok(())
        }

        fn handle_command(&self, amount: &i64) -> Result<Vec<LedgerEvent>, Frozen> {
            Ok(vec![LedgerEvent::Credited(*amount)])
        }
    }

    /// Same UUID space, different aggregate type
    #[derive(Debug, Default)]
    struct Vault;

    impl Aggregate for Vault {
        const AGGREGATE_TYPE: &'static str = "vault";
        type Id = VaultId;
        type Event = LedgerEvent;
        type Command = ();
        type Error = Frozen;

        fn apply_event(&mut self, _event: &LedgerEvent) -> Result<(), Frozen> {
            Ok(())
        }

        fn handle_command(&self, _command: &()) -> Result<Vec<LedgerEvent>, Frozen> {
            Ok(vec![LedgerEvent::Frozen])
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = InMemoryEventStore::new();
        let id = LedgerId::generate();
        let mut root = AggregateRoot::<Ledger>::new(id);
        root.execute(&10).unwrap();
        root.execute(&5).unwrap();

        let version = store.save(&mut root, Uuid::new_v4()).await.unwrap();
        assert_eq!(version, 2);
        assert!(!root.has_uncommitted_events());

        let loaded: AggregateRoot<Ledger> = store.load(&id).await.unwrap();
        assert_eq!(loaded.version(), 2);
        assert_eq!(loaded.state().balance, 15);
        assert!(!loaded.has_uncommitted_events());
    }

    #[tokio::test]
    async fn test_stored_envelopes_carry_metadata() {
        let store = InMemoryEventStore::new();
        let id = LedgerId::generate();
        let correlation_id = Uuid::new_v4();
        let mut root = AggregateRoot::<Ledger>::new(id);
        root.execute(&1).unwrap();
        root.execute(&2).unwrap();
        store.save(&mut root, correlation_id).await.unwrap();

        let stream = store.stream(id.identity()).await;
        assert_eq!(stream.len(), 2);
        assert_eq!(stream[0].sequence_number, 1);
        assert_eq!(stream[1].sequence_number, 2);
        assert_eq!(stream[1].event_type, "Credited");
        assert_eq!(stream[1].aggregate_type, "ledger");
        assert_eq!(stream[0].correlation_id, correlation_id);
    }

    #[tokio::test]
    async fn test_stale_root_conflicts() {
        let store = InMemoryEventStore::new();
        let id = LedgerId::generate();
        let mut root = AggregateRoot::<Ledger>::new(id);
        root.execute(&1).unwrap();
        store.save(&mut root, Uuid::new_v4()).await.unwrap();

        let mut first: AggregateRoot<Ledger> = store.load(&id).await.unwrap();
        let mut second: AggregateRoot<Ledger> = store.load(&id).await.unwrap();
        first.execute(&2).unwrap();
        second.execute(&3).unwrap();

        assert_eq!(store.save(&mut first, Uuid::new_v4()).await.unwrap(), 2);
        let err = store.save(&mut second, Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(
            err,
            KernelError::ConcurrencyConflict { expected: 1, actual: 2, .. }
        ));
        // Rejected events stay buffered on the losing root
        assert_eq!(second.uncommitted_event_count(), 1);
    }

    #[tokio::test]
    async fn test_corrupted_root_rejected() {
        let store = InMemoryEventStore::new();
        let id = LedgerId::generate();
        let mut root = AggregateRoot::<Ledger>::new(id);
        root.record_that(LedgerEvent::Frozen).unwrap();
        assert!(root.record_that(LedgerEvent::Credited(1)).is_err());

        let err = store.save(&mut root, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, KernelError::AggregateCorrupted(_)));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_save_without_changes_is_noop() {
        let store = InMemoryEventStore::new();
        let mut root = AggregateRoot::<Ledger>::new(LedgerId::generate());

        assert_eq!(store.save(&mut root, Uuid::new_v4()).await.unwrap(), 0);
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_noop_save_leaves_no_stream_behind() {
        let store = InMemoryEventStore::new();
        let id = LedgerId::generate();

        for _ in 0..3 {
            let mut root = AggregateRoot::<Ledger>::new(id);
            store.save(&mut root, Uuid::new_v4()).await.unwrap();
        }

        assert!(store.streams.read().await.is_empty());
        assert!(!store.aggregate_exists(id.identity()).await.unwrap());
    }

    #[tokio::test]
    async fn test_load_missing_aggregate() {
        let store = InMemoryEventStore::new();
        let id = LedgerId::generate();

        let err = store.load::<Ledger>(&id).await.unwrap_err();
        assert!(matches!(err, KernelError::AggregateNotFound(_)));
        assert!(!store.aggregate_exists(id.identity()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_event_type_fails_replay() {
        let store = InMemoryEventStore::new();
        let id = LedgerId::generate();
        let mut root = AggregateRoot::<Ledger>::new(id);
        root.execute(&4).unwrap();
        store.save(&mut root, Uuid::new_v4()).await.unwrap();

        store
            .streams
            .write()
            .await
            .get_mut(&id.identity())
            .unwrap()[0]
            .event_type = "Debited".to_string();

        let err = store.load::<Ledger>(&id).await.unwrap_err();
        assert!(matches!(
            err,
            KernelError::UnknownEventType { ref event_type, .. } if event_type == "Debited"
        ));
    }

    #[tokio::test]
    async fn test_apply_failure_during_replay() {
        let store = InMemoryEventStore::new();
        let id = LedgerId::generate();

        // Write a stream that can't be replayed: a credit after a freeze
        let mut root = AggregateRoot::<Ledger>::new(id);
        root.record_that(LedgerEvent::Frozen).unwrap();
        store.save(&mut root, Uuid::new_v4()).await.unwrap();
        let envelope = EventEnvelope::new("ledger", *id.as_uuid(), 2, LedgerEvent::Credited(1), Uuid::new_v4())
            .encode()
            .unwrap();
        store
            .streams
            .write()
            .await
            .get_mut(&id.identity())
            .unwrap()
            .push(envelope);

        let err = store.load::<Ledger>(&id).await.unwrap_err();
        assert!(matches!(err, KernelError::Replay { .. }));
    }

    #[tokio::test]
    async fn test_streams_are_kind_qualified() {
        let store = InMemoryEventStore::new();
        let uuid = Uuid::new_v4();
        let ledger_id: LedgerId = uuid.to_string().parse().unwrap();
        let vault_id: VaultId = uuid.to_string().parse().unwrap();

        let mut ledger = AggregateRoot::<Ledger>::new(ledger_id);
        ledger.execute(&1).unwrap();
        store.save(&mut ledger, Uuid::new_v4()).await.unwrap();

        let mut vault = AggregateRoot::<Vault>::new(vault_id);
        vault.execute(&()).unwrap();
        assert_eq!(store.save(&mut vault, Uuid::new_v4()).await.unwrap(), 1);

        assert_eq!(store.current_version(ledger_id.identity()).await.unwrap(), 1);
        assert_eq!(store.current_version(vault_id.identity()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let store = InMemoryEventStore::new().with_metrics(metrics.clone());
        let id = LedgerId::generate();

        let mut root = AggregateRoot::<Ledger>::new(id);
        root.execute(&1).unwrap();
        root.execute(&1).unwrap();
        store.save(&mut root, Uuid::new_v4()).await.unwrap();

        let mut stale = AggregateRoot::<Ledger>::new(id);
        stale.execute(&1).unwrap();
        assert!(store.save(&mut stale, Uuid::new_v4()).await.is_err());

        let text = metrics.render().unwrap();
        assert!(text.contains("events_appended_total{aggregate_type=\"ledger\"} 2"));
        assert!(text.contains("concurrency_conflicts_total{aggregate_type=\"ledger\"} 1"));
    }
}
