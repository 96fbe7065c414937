use std::fmt;

use super::aggregate_id::AggregateId;
use super::event::{DomainEvent, EventEnvelope};

// ============================================================================
// Aggregate Root Pattern - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. State is derived from events (not stored directly)
// 2. Commands are validated before emitting events
// 3. Events represent facts that have already happened
// 4. All state changes flow through events
//
// `Aggregate` is the domain half: state, an exhaustive event match and
// command validation. `AggregateRoot` is the kernel half: identity, version
// and the uncommitted event buffer.
//
// ============================================================================

/// Generic Aggregate trait - all event-sourced aggregates implement this
///
/// `Default` provides the fresh state that recording and replay start from.
pub trait Aggregate: Default + Sized + Send + Sync {
    /// Aggregate type name used by stores and logs ("order", "customer")
    const AGGREGATE_TYPE: &'static str;

    type Id: AggregateId;
    type Event: DomainEvent;
    type Command;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Apply one event to the state.
    ///
    /// Must be an exhaustive `match` over `Self::Event`. Called for newly
    /// recorded events and during replay alike.
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Validate a command against current state and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

/// Event-sourced aggregate instance.
///
/// Not synchronized: one logical unit of work owns a root at a time.
pub struct AggregateRoot<A: Aggregate> {
    id: A::Id,
    version: u64,
    committed: u64,
    state: A,
    uncommitted: Vec<A::Event>,
    corrupted: bool,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Fresh aggregate with default state and version 0
    pub fn new(id: A::Id) -> Self {
        Self {
            id,
            version: 0,
            committed: 0,
            state: A::default(),
            uncommitted: Vec::new(),
            corrupted: false,
        }
    }

    /// Rehydrate from persisted history.
    ///
    /// Events are applied in order without touching the uncommitted buffer;
    /// the version ends up equal to the number of replayed events.
    pub fn load_from_events<I>(id: A::Id, history: I) -> Result<Self, A::Error>
    where
        I: IntoIterator<Item = A::Event>,
    {
        let mut root = Self::new(id);
        for event in history {
            root.apply(&event)?;
        }
        Ok(root)
    }

    /// Rehydrate from stored envelopes (payload already decoded)
    pub fn load_from_envelopes(
        id: A::Id,
        envelopes: Vec<EventEnvelope<A::Event>>,
    ) -> Result<Self, A::Error> {
        Self::load_from_events(id, envelopes.into_iter().map(|envelope| envelope.event_data))
    }

    /// Record a new event: buffer it, apply it, bump the version.
    ///
    /// If the aggregate rejects the event the root is left corrupted (the
    /// event stays buffered, the version is not advanced) and must be
    /// discarded. Stores refuse to persist corrupted roots.
    pub fn record_that(&mut self, event: A::Event) -> Result<(), A::Error> {
        self.uncommitted.push(event);
        let Self { state, uncommitted, version, corrupted, .. } = self;
        let Some(event) = uncommitted.last() else {
            return Ok(());
        };

        match state.apply_event(event) {
            Ok(()) => {
                *version += 1;
                Ok(())
            }
            Err(e) => {
                *corrupted = true;
                Err(e)
            }
        }
    }

    /// Run a command through the aggregate and record every event it emits.
    ///
    /// Returns the number of events recorded. A rejected command records
    /// nothing.
    pub fn execute(&mut self, command: &A::Command) -> Result<usize, A::Error> {
        let events = self.state.handle_command(command)?;
        let count = events.len();
        for event in events {
            self.record_that(event)?;
        }
        Ok(count)
    }

    /// Apply a persisted event; used by replay
    pub(crate) fn apply(&mut self, event: &A::Event) -> Result<(), A::Error> {
        if let Err(e) = self.state.apply_event(event) {
            self.corrupted = true;
            return Err(e);
        }
        self.version += 1;
        self.committed += 1;
        Ok(())
    }

    /// Drain the uncommitted buffer. A second call returns nothing.
    pub fn pull_domain_events(&mut self) -> Vec<A::Event> {
        self.committed = self.version;
        std::mem::take(&mut self.uncommitted)
    }

    /// Drop the uncommitted buffer without returning it
    pub fn mark_events_as_committed(&mut self) {
        self.committed = self.version;
        self.uncommitted.clear();
    }

    pub fn uncommitted_events(&self) -> &[A::Event] {
        &self.uncommitted
    }

    pub fn has_uncommitted_events(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    pub fn uncommitted_event_count(&self) -> usize {
        self.uncommitted.len()
    }

    pub fn id(&self) -> &A::Id {
        &self.id
    }

    /// Number of events applied since construction
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Version last persisted, i.e. before the buffered events
    pub fn committed_version(&self) -> u64 {
        self.committed
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }
}

impl<A> fmt::Debug for AggregateRoot<A>
where
    A: Aggregate + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRoot")
            .field("type", &A::AGGREGATE_TYPE)
            .field("id", &self.id)
            .field("version", &self.version)
            .field("uncommitted", &self.uncommitted.len())
            .field("corrupted", &self.corrupted)
            .field("state", &self.state)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
