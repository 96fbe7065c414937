// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// The store contract every backend implements, plus an in-memory backend.
// All components work with ANY aggregate/event type.
//
// ============================================================================

pub mod event_store;

pub use event_store::{EventStore, InMemoryEventStore};
