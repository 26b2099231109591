use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A two-party chat with a fixed translation direction. Immutable after
/// creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: Uuid,
    pub participant_a: String,
    pub participant_b: String,
    pub source_lang: String,
    pub target_lang: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChat {
    pub participant_a: String,
    pub participant_b: String,
    pub source_lang: String,
    pub target_lang: String,
}

/// A stored chat message.
///
/// Created untranslated; exactly one later update sets `translated_content`
/// and flips `translated`. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub translated_content: String,
    pub translated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
}
