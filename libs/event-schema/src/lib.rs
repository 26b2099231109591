//! Event schemas for the message-translation pipeline.
//!
//! Both topics carry JSON-encoded, schema-versioned envelopes. Envelopes are
//! immutable once published; the `event_id` gives consumers a stable handle
//! for idempotency and tracing under at-least-once delivery.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for all events.
pub const SCHEMA_VERSION: u32 = 1;

/// Published by the chat service after a message is durably stored and the
/// owning chat requires translation.
pub const TOPIC_MESSAGE_SENT: &str = "message.sent";

/// Published by the translation worker once a translation attempt completes.
pub const TOPIC_MESSAGE_TRANSLATED: &str = "message.translated";

/// Dead-letter topic for `message.sent` events whose translation failed
/// after the retry budget was exhausted.
pub const TOPIC_MESSAGE_SENT_DLQ: &str = "message.sent.dlq";

/// Base envelope for all channel messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    /// Unique event ID for idempotency and tracing.
    pub event_id: Uuid,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// Schema version for compatibility checking.
    pub schema_version: u32,
    /// Source service that generated the event.
    pub source: String,
    /// Actual event payload.
    pub data: T,
}

impl<T> EventEnvelope<T> {
    pub fn new(source: impl Into<String>, data: T) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            schema_version: SCHEMA_VERSION,
            source: source.into(),
            data,
        }
    }
}

impl<T: Serialize> EventEnvelope<T> {
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl<T: DeserializeOwned> EventEnvelope<T> {
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// A stored, untranslated message that needs translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSentEvent {
    pub message_id: Uuid,
    pub chat_id: Uuid,
    pub content: String,
    pub source_lang: String,
    pub target_lang: String,
}

/// Outcome of a translation attempt for a single message.
///
/// `success = false` reports a permanently failed attempt; consumers must
/// never write `translated_content` from such an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTranslatedEvent {
    pub message_id: Uuid,
    pub translated_content: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let event = MessageSentEvent {
            message_id: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            content: "Hello".to_string(),
            source_lang: "en".to_string(),
            target_lang: "de".to_string(),
        };
        let envelope = EventEnvelope::new("chat-service", event.clone());

        let bytes = envelope.to_json().unwrap();
        let decoded: EventEnvelope<MessageSentEvent> = EventEnvelope::from_json(&bytes).unwrap();

        assert_eq!(decoded.event_id, envelope.event_id);
        assert_eq!(decoded.schema_version, SCHEMA_VERSION);
        assert_eq!(decoded.source, "chat-service");
        assert_eq!(decoded.data.message_id, event.message_id);
        assert_eq!(decoded.data.content, "Hello");
    }

    #[test]
    fn failure_event_carries_no_translation() {
        let event = MessageTranslatedEvent {
            message_id: Uuid::new_v4(),
            translated_content: String::new(),
            success: false,
        };
        let bytes = serde_json::to_vec(&EventEnvelope::new("translation-service", event)).unwrap();
        let decoded: EventEnvelope<MessageTranslatedEvent> =
            EventEnvelope::from_json(&bytes).unwrap();
        assert!(!decoded.data.success);
        assert!(decoded.data.translated_content.is_empty());
    }
}
