use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use super::error::KernelError;

// ============================================================================
// Domain Event Trait
// ============================================================================

/// Generic Domain Event trait
///
/// Implemented by each aggregate's event enum. Every variant has a stable
/// type tag; `EVENT_TYPES` lists them all so stores can reject stored events
/// the enum no longer knows about.
pub trait DomainEvent: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync {
    /// Every type tag this event enum can produce
    const EVENT_TYPES: &'static [&'static str];

    fn event_type(&self) -> &'static str;

    fn event_version(&self) -> i32 {
        1
    }
}

// ============================================================================
// Event Envelope - Event Metadata
// ============================================================================
//
// Wraps a drained domain event with the metadata a store persists alongside
// it. Generic over the payload: stores keep `EventEnvelope<String>` (the JSON
// payload) and decode into `EventEnvelope<E>` on load.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub sequence_number: u64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Causation & Correlation
    pub causation_id: Option<Uuid>,
    pub correlation_id: Uuid,

    // Timing
    pub timestamp: DateTime<Utc>,

    pub metadata: HashMap<String, String>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(
        aggregate_type: &str,
        aggregate_id: Uuid,
        sequence_number: u64,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            // time-ordered so ids sort with the stream
            event_id: Uuid::now_v7(),
            aggregate_type: aggregate_type.to_string(),
            aggregate_id,
            sequence_number,
            event_type: event_data.event_type().to_string(),
            event_version: event_data.event_version(),
            event_data,
            causation_id: None,
            correlation_id,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Serialize the payload, keeping all metadata
    pub fn encode(&self) -> Result<EventEnvelope<String>, KernelError> {
        let payload = serialize_event(&self.event_data)?;
        Ok(self.with_payload(payload))
    }
}

impl<E> EventEnvelope<E> {
    pub fn with_causation(mut self, causation_id: Uuid) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    pub fn with_metadata(mut self, key: String, value: String) -> Self {
        self.metadata.insert(key, value);
        self
    }

    fn with_payload<P>(&self, event_data: P) -> EventEnvelope<P> {
        EventEnvelope {
            event_id: self.event_id,
            aggregate_type: self.aggregate_type.clone(),
            aggregate_id: self.aggregate_id,
            sequence_number: self.sequence_number,
            event_type: self.event_type.clone(),
            event_version: self.event_version,
            event_data,
            causation_id: self.causation_id,
            correlation_id: self.correlation_id,
            timestamp: self.timestamp,
            metadata: self.metadata.clone(),
        }
    }
}

impl EventEnvelope<String> {
    /// Decode the JSON payload into `E`.
    ///
    /// Fails with `UnknownEventType` when the stored type tag is not one of
    /// `E::EVENT_TYPES`, so replay never silently drops a state transition.
    pub fn decode<E: DomainEvent>(
        &self,
        aggregate_type: &'static str,
    ) -> Result<EventEnvelope<E>, KernelError> {
        if !E::EVENT_TYPES.contains(&self.event_type.as_str()) {
            return Err(KernelError::UnknownEventType {
                aggregate_type,
                event_type: self.event_type.clone(),
                expected: E::EVENT_TYPES,
            });
        }

        let event: E = deserialize_event(&self.event_data)?;
        Ok(self.with_payload(event))
    }
}

// ============================================================================
// Event Serialization Helpers
// ============================================================================

pub fn serialize_event<E: Serialize>(event: &E) -> Result<String, KernelError> {
    Ok(serde_json::to_string(event)?)
}

pub fn deserialize_event<E: DeserializeOwned>(json: &str) -> Result<E, KernelError> {
    Ok(serde_json::from_str(json)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    #[serde(tag = "type", content = "data")]
    enum TestEvent {
        Opened { data: String },
        Closed,
    }

    impl DomainEvent for TestEvent {
        const EVENT_TYPES: &'static [&'static str] = &["TestOpened", "TestClosed"];

        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Opened { .. } => "TestOpened",
                TestEvent::Closed => "TestClosed",
            }
        }
    }

    #[test]
    fn test_event_envelope_creation() {
        let aggregate_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let envelope = EventEnvelope::new(
            "test",
            aggregate_id,
            1,
            TestEvent::Opened { data: "test".to_string() },
            correlation_id,
        );

        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.aggregate_type, "test");
        assert_eq!(envelope.sequence_number, 1);
        assert_eq!(envelope.event_type, "TestOpened");
        assert_eq!(envelope.event_version, 1);
        assert_eq!(envelope.correlation_id, correlation_id);
    }

    #[test]
    fn test_encode_then_decode_keeps_metadata() {
        let causation = Uuid::new_v4();
        let envelope = EventEnvelope::new("test", Uuid::new_v4(), 7, TestEvent::Closed, Uuid::new_v4())
            .with_causation(causation)
            .with_metadata("source".to_string(), "unit".to_string());

        let stored = envelope.encode().unwrap();
        let decoded: EventEnvelope<TestEvent> = stored.decode("test").unwrap();

        assert_eq!(decoded.event_data, TestEvent::Closed);
        assert_eq!(decoded.event_id, envelope.event_id);
        assert_eq!(decoded.sequence_number, 7);
        assert_eq!(decoded.causation_id, Some(causation));
        assert_eq!(decoded.metadata.get("source").map(String::as_str), Some("unit"));
    }

    #[test]
    fn test_decode_unknown_type_fails_loudly() {
        let mut stored = EventEnvelope::new("test", Uuid::new_v4(), 1, TestEvent::Closed, Uuid::new_v4())
            .encode()
            .unwrap();
        stored.event_type = "TestRenamed".to_string();

        let err = stored.decode::<TestEvent>("test").unwrap_err();
        assert!(matches!(
            err,
            KernelError::UnknownEventType { ref event_type, .. } if event_type == "TestRenamed"
        ));
    }

    #[test]
    fn test_event_serialization() {
        let event = TestEvent::Opened { data: "test data".to_string() };

        let json = serialize_event(&event).unwrap();
        let deserialized: TestEvent = deserialize_event(&json).unwrap();

        assert_eq!(event, deserialized);
    }
}
