use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use super::{ChatStore, Cursor};
use crate::error::{ChatError, ChatResult};
use crate::models::{Chat, Message, NewChat, NewMessage};

/// Postgres-backed store. Single-row updates give the serialization the
/// idempotence contract relies on under concurrent delivery.
pub struct PgChatStore {
    pool: Pool<Postgres>,
}

impl PgChatStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn chat_from_row(row: &sqlx::postgres::PgRow) -> Chat {
    Chat {
        chat_id: row.get("chat_id"),
        participant_a: row.get("participant_a"),
        participant_b: row.get("participant_b"),
        source_lang: row.get("source_lang"),
        target_lang: row.get("target_lang"),
        created_at: row.get("created_at"),
    }
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> Message {
    Message {
        message_id: row.get("message_id"),
        chat_id: row.get("chat_id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        translated_content: row.get("translated_content"),
        translated: row.get("translated"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn create_chat(&self, chat: NewChat) -> ChatResult<Chat> {
        let created = Chat {
            chat_id: Uuid::new_v4(),
            participant_a: chat.participant_a,
            participant_b: chat.participant_b,
            source_lang: chat.source_lang,
            target_lang: chat.target_lang,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO chats (chat_id, participant_a, participant_b, source_lang, target_lang, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(created.chat_id)
        .bind(&created.participant_a)
        .bind(&created.participant_b)
        .bind(&created.source_lang)
        .bind(&created.target_lang)
        .bind(created.created_at)
        .execute(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_chat(&self, chat_id: Uuid) -> ChatResult<Chat> {
        let row = sqlx::query(
            "SELECT chat_id, participant_a, participant_b, source_lang, target_lang, created_at \
             FROM chats WHERE chat_id = $1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ChatError::ChatNotFound(chat_id))?;

        Ok(chat_from_row(&row))
    }

    async fn list_chats(&self, participant: &str) -> ChatResult<Vec<Chat>> {
        let rows = sqlx::query(
            "SELECT chat_id, participant_a, participant_b, source_lang, target_lang, created_at \
             FROM chats \
             WHERE participant_a = $1 OR participant_b = $1 \
             ORDER BY created_at DESC",
        )
        .bind(participant)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(chat_from_row).collect())
    }

    async fn add_message(&self, msg: NewMessage) -> ChatResult<Message> {
        let created = Message {
            message_id: Uuid::new_v4(),
            chat_id: msg.chat_id,
            sender_id: msg.sender_id,
            receiver_id: msg.receiver_id,
            content: msg.content,
            translated_content: String::new(),
            translated: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO messages \
             (message_id, chat_id, sender_id, receiver_id, content, translated_content, translated, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(created.message_id)
        .bind(created.chat_id)
        .bind(&created.sender_id)
        .bind(&created.receiver_id)
        .bind(&created.content)
        .bind(&created.translated_content)
        .bind(created.translated)
        .bind(created.created_at)
        .execute(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_message(&self, message_id: Uuid) -> ChatResult<Message> {
        let row = sqlx::query(
            "SELECT message_id, chat_id, sender_id, receiver_id, content, translated_content, translated, created_at \
             FROM messages WHERE message_id = $1",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ChatError::MessageNotFound(message_id))?;

        Ok(message_from_row(&row))
    }

    async fn list_messages(
        &self,
        chat_id: Uuid,
        since: Option<Cursor>,
        limit: i64,
    ) -> ChatResult<(Vec<Message>, Option<Cursor>)> {
        let (since_ts, since_id): (DateTime<Utc>, Uuid) = match since {
            Some(cursor) => (
                DateTime::from_timestamp_micros(cursor.created_at_micros)
                    .unwrap_or(DateTime::UNIX_EPOCH),
                cursor.message_id,
            ),
            None => (DateTime::UNIX_EPOCH, Uuid::nil()),
        };

        // Keyset pagination over (created_at, message_id): the row
        // comparison matches the ORDER BY, so a page boundary cannot split
        // messages sharing a timestamp. One extra row tells us whether
        // another page exists.
        let rows = sqlx::query(
            "SELECT message_id, chat_id, sender_id, receiver_id, content, translated_content, translated, created_at \
             FROM messages \
             WHERE chat_id = $1 AND (created_at, message_id) > ($2, $3) \
             ORDER BY created_at ASC, message_id ASC \
             LIMIT $4",
        )
        .bind(chat_id)
        .bind(since_ts)
        .bind(since_id)
        .bind(limit + 1)
        .fetch_all(&self.pool)
        .await?;

        let has_more = rows.len() as i64 > limit;
        let messages: Vec<Message> = rows
            .iter()
            .take(limit as usize)
            .map(message_from_row)
            .collect();

        let next_cursor = if has_more {
            messages.last().map(Cursor::of)
        } else {
            None
        };

        Ok((messages, next_cursor))
    }

    async fn update_message_translation(
        &self,
        message_id: Uuid,
        translated_content: &str,
    ) -> ChatResult<()> {
        // First write wins: only an untranslated row or an identical
        // re-application passes the predicate.
        let result = sqlx::query(
            "UPDATE messages SET translated_content = $2, translated = TRUE \
             WHERE message_id = $1 AND (translated = FALSE OR translated_content = $2)",
        )
        .bind(message_id)
        .bind(translated_content)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists = sqlx::query("SELECT 1 AS one FROM messages WHERE message_id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        if exists {
            Err(ChatError::TranslationConflict(message_id))
        } else {
            Err(ChatError::MessageNotFound(message_id))
        }
    }
}
