// ============================================================================
// Aggregate Kernel - Event-Sourced Aggregates with Retrying Commands
// ============================================================================
//
// Layers:
// - event_sourcing: aggregate root, ids, event envelopes, store contract
// - retry: error kinds, backoff policies, configuration
// - command: command contracts and the retrying dispatcher
// - domain: sample order aggregate wired through all of the above
// - metrics: Prometheus counters for retries and appends
//
// ============================================================================

pub mod command;
pub mod domain;
pub mod event_sourcing;
pub mod metrics;
pub mod retry;
