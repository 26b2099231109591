use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ChatStore, Cursor};
use crate::error::{ChatError, ChatResult};
use crate::models::{Chat, Message, NewChat, NewMessage};

#[derive(Default)]
struct Inner {
    chats: HashMap<Uuid, Chat>,
    messages: HashMap<Uuid, Message>,
    // Per-chat high-water mark keeping created_at strictly increasing, for
    // deterministic read order under rapid appends.
    last_created: HashMap<Uuid, DateTime<Utc>>,
}

// Storage timestamps carry microsecond precision, like timestamptz.
fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

/// In-memory store with the same contract as the Postgres one. Backs tests
/// and single-process setups.
#[derive(Default)]
pub struct MemoryChatStore {
    inner: Mutex<Inner>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ChatResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| ChatError::Config("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn create_chat(&self, chat: NewChat) -> ChatResult<Chat> {
        let created = Chat {
            chat_id: Uuid::new_v4(),
            participant_a: chat.participant_a,
            participant_b: chat.participant_b,
            source_lang: chat.source_lang,
            target_lang: chat.target_lang,
            created_at: Utc::now(),
        };
        self.lock()?.chats.insert(created.chat_id, created.clone());
        Ok(created)
    }

    async fn get_chat(&self, chat_id: Uuid) -> ChatResult<Chat> {
        self.lock()?
            .chats
            .get(&chat_id)
            .cloned()
            .ok_or(ChatError::ChatNotFound(chat_id))
    }

    async fn list_chats(&self, participant: &str) -> ChatResult<Vec<Chat>> {
        let mut chats: Vec<Chat> = self
            .lock()?
            .chats
            .values()
            .filter(|c| c.participant_a == participant || c.participant_b == participant)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }

    async fn add_message(&self, msg: NewMessage) -> ChatResult<Message> {
        let mut inner = self.lock()?;

        let mut created_at = now_micros();
        if let Some(last) = inner.last_created.get(&msg.chat_id) {
            if created_at <= *last {
                created_at = *last + chrono::Duration::microseconds(1);
            }
        }
        inner.last_created.insert(msg.chat_id, created_at);

        let created = Message {
            message_id: Uuid::new_v4(),
            chat_id: msg.chat_id,
            sender_id: msg.sender_id,
            receiver_id: msg.receiver_id,
            content: msg.content,
            translated_content: String::new(),
            translated: false,
            created_at,
        };
        inner.messages.insert(created.message_id, created.clone());
        Ok(created)
    }

    async fn get_message(&self, message_id: Uuid) -> ChatResult<Message> {
        self.lock()?
            .messages
            .get(&message_id)
            .cloned()
            .ok_or(ChatError::MessageNotFound(message_id))
    }

    async fn list_messages(
        &self,
        chat_id: Uuid,
        since: Option<Cursor>,
        limit: i64,
    ) -> ChatResult<(Vec<Message>, Option<Cursor>)> {
        let mut matching: Vec<Message> = self
            .lock()?
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id && since.map_or(true, |c| Cursor::of(m) > c))
            .cloned()
            .collect();
        matching.sort_by_key(Cursor::of);

        let has_more = matching.len() as i64 > limit;
        matching.truncate(limit as usize);

        let next_cursor = if has_more {
            matching.last().map(Cursor::of)
        } else {
            None
        };

        Ok((matching, next_cursor))
    }

    async fn update_message_translation(
        &self,
        message_id: Uuid,
        translated_content: &str,
    ) -> ChatResult<()> {
        let mut inner = self.lock()?;
        let msg = inner
            .messages
            .get_mut(&message_id)
            .ok_or(ChatError::MessageNotFound(message_id))?;

        if msg.translated && msg.translated_content != translated_content {
            return Err(ChatError::TranslationConflict(message_id));
        }

        msg.translated_content = translated_content.to_string();
        msg.translated = true;
        Ok(())
    }
}
