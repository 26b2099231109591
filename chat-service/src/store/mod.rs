//! Durable record of chats and messages.
//!
//! The trait is the seam between the service layer and the storage engine:
//! production runs against Postgres, tests against the in-memory store.

mod memory;
mod postgres;

pub use memory::MemoryChatStore;
pub use postgres::PgChatStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::models::{Chat, Message, NewChat, NewMessage};

/// Keyset pagination cursor: position of the last message returned, in the
/// `(created_at, message_id)` order messages are read in. The composite key
/// means a page boundary can never split messages sharing a timestamp.
/// Cursors are monotonically non-decreasing over a chat's read sequence; a
/// cursor past the newest message yields an empty page, not an error.
///
/// Storage keeps timestamps at microsecond precision, so the cursor does
/// too. Field order gives the derived `Ord` the same lexicographic
/// comparison the storage query uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor {
    pub created_at_micros: i64,
    pub message_id: Uuid,
}

impl Cursor {
    /// Position of `message` in its chat's read sequence.
    pub fn of(message: &Message) -> Self {
        Self {
            created_at_micros: message.created_at.timestamp_micros(),
            message_id: message.message_id,
        }
    }

    /// Everything strictly after `ts`, whatever the message id.
    pub fn after(ts: DateTime<Utc>) -> Self {
        Self::after_micros(ts.timestamp_micros())
    }

    /// Everything strictly after the given Unix-microsecond instant.
    pub fn after_micros(created_at_micros: i64) -> Self {
        Self {
            created_at_micros,
            message_id: Uuid::max(),
        }
    }
}

/// Opaque wire form of a cursor, handed out as a page token.
pub fn encode_page_token(cursor: Cursor) -> String {
    format!(
        "{}:{}",
        cursor.created_at_micros,
        cursor.message_id.simple()
    )
}

pub fn decode_page_token(token: &str) -> ChatResult<Cursor> {
    let malformed = || ChatError::InvalidArgument(format!("malformed page token: {token:?}"));
    let (micros, id) = token.split_once(':').ok_or_else(malformed)?;
    Ok(Cursor {
        created_at_micros: micros.parse().map_err(|_| malformed())?,
        message_id: id.parse().map_err(|_| malformed())?,
    })
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_chat(&self, chat: NewChat) -> ChatResult<Chat>;

    async fn get_chat(&self, chat_id: Uuid) -> ChatResult<Chat>;

    /// Chats where `participant` is either party, newest first.
    async fn list_chats(&self, participant: &str) -> ChatResult<Vec<Chat>>;

    /// Assigns the id and server-side timestamp and persists the row with
    /// `translated = false`. On failure the caller must not assume the
    /// message exists.
    async fn add_message(&self, msg: NewMessage) -> ChatResult<Message>;

    async fn get_message(&self, message_id: Uuid) -> ChatResult<Message>;

    /// At most `limit` messages strictly after `since`, ascending by
    /// `(created_at, message_id)`. The returned cursor is `Some` only when
    /// more messages remain past this page.
    async fn list_messages(
        &self,
        chat_id: Uuid,
        since: Option<Cursor>,
        limit: i64,
    ) -> ChatResult<(Vec<Message>, Option<Cursor>)>;

    /// Sets `translated_content` and flips `translated`. Idempotent:
    /// re-applying the same text is a no-op. A second, different text is
    /// rejected with [`ChatError::TranslationConflict`] (first write wins).
    /// Serialized at the storage layer by a single-row atomic update.
    async fn update_message_translation(
        &self,
        message_id: Uuid,
        translated_content: &str,
    ) -> ChatResult<()>;
}
