//! Service layer behind the chat RPC surface.
//!
//! Owns validation, the outbound `message.sent` publisher and the polling
//! live-update streamer. Handlers of whatever transport fronts this service
//! call straight into these methods.

use std::sync::Arc;
use std::time::Duration;

use event_channel::EventChannel;
use event_schema::{EventEnvelope, MessageSentEvent, TOPIC_MESSAGE_SENT};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::models::{Chat, Message, NewChat, NewMessage};
use crate::store::{decode_page_token, encode_page_token, ChatStore, Cursor};

const SOURCE: &str = "chat-service";
const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;
const STREAM_PAGE_SIZE: i64 = 100;

pub struct ChatService {
    store: Arc<dyn ChatStore>,
    channel: Arc<dyn EventChannel>,
    poll_interval: Duration,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>, channel: Arc<dyn EventChannel>) -> Self {
        Self {
            store,
            channel,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Streaming latency is bounded by this interval. Tests shrink it.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn create_chat(
        &self,
        participant_a: &str,
        participant_b: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> ChatResult<Chat> {
        if participant_a.is_empty()
            || participant_b.is_empty()
            || source_lang.is_empty()
            || target_lang.is_empty()
        {
            return Err(ChatError::InvalidArgument(
                "participant_a, participant_b, source_lang and target_lang are required".into(),
            ));
        }

        self.store
            .create_chat(NewChat {
                participant_a: participant_a.to_string(),
                participant_b: participant_b.to_string(),
                source_lang: source_lang.to_string(),
                target_lang: target_lang.to_string(),
            })
            .await
    }

    pub async fn get_chat(&self, chat_id: Uuid) -> ChatResult<Chat> {
        self.store.get_chat(chat_id).await
    }

    pub async fn list_chats(&self, participant: &str) -> ChatResult<Vec<Chat>> {
        if participant.is_empty() {
            return Err(ChatError::InvalidArgument("participant is required".into()));
        }
        self.store.list_chats(participant).await
    }

    /// Store the message, then hand it to the translation pipeline when the
    /// owning chat crosses a language barrier.
    ///
    /// Contract: a publish failure fails the whole call with
    /// [`ChatError::Channel`]. The message itself stays stored; callers
    /// retry the send and readers may meanwhile see the untranslated
    /// message.
    pub async fn send_message(
        &self,
        chat_id: Uuid,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> ChatResult<Message> {
        if sender_id.is_empty() || receiver_id.is_empty() || content.is_empty() {
            return Err(ChatError::InvalidArgument(
                "sender_id, receiver_id and content are required".into(),
            ));
        }

        let chat = self.store.get_chat(chat_id).await?;

        let message = self
            .store
            .add_message(NewMessage {
                chat_id,
                sender_id: sender_id.to_string(),
                receiver_id: receiver_id.to_string(),
                content: content.to_string(),
            })
            .await?;

        if chat.source_lang != chat.target_lang {
            let event = MessageSentEvent {
                message_id: message.message_id,
                chat_id,
                content: message.content.clone(),
                source_lang: chat.source_lang.clone(),
                target_lang: chat.target_lang.clone(),
            };
            let payload = EventEnvelope::new(SOURCE, event).to_json()?;
            self.channel
                .publish(TOPIC_MESSAGE_SENT, &message.message_id.to_string(), &payload)
                .await?;
            info!(message_id = %message.message_id, chat_id = %chat_id, "message queued for translation");
        }

        Ok(message)
    }

    pub async fn get_message(&self, message_id: Uuid) -> ChatResult<Message> {
        self.store.get_message(message_id).await
    }

    /// Resumable pagination. `page_token` (from a previous call) takes
    /// precedence over `since_timestamp` (Unix seconds).
    pub async fn list_messages(
        &self,
        chat_id: Uuid,
        since_timestamp: Option<i64>,
        limit: i64,
        page_token: Option<&str>,
    ) -> ChatResult<(Vec<Message>, Option<String>)> {
        let limit = if limit <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            limit.min(MAX_PAGE_SIZE)
        };

        let since: Option<Cursor> = match page_token {
            Some(token) if !token.is_empty() => Some(decode_page_token(token)?),
            _ => since_timestamp.map(|secs| Cursor::after_micros(secs.saturating_mul(1_000_000))),
        };

        let (messages, next_cursor) = self.store.list_messages(chat_id, since, limit).await?;
        Ok((messages, next_cursor.map(encode_page_token)))
    }

    /// Logical subscription over newly-appended messages: a polling
    /// simulation of push delivery, latency bounded by the poll interval.
    ///
    /// Emits messages strictly newer than `since` (defaults to now) in
    /// order. The task stops as soon as the receiver is dropped; a poll
    /// already in flight cannot emit past cancellation because every send
    /// observes the closed channel.
    pub fn stream_messages(&self, chat_id: Uuid, since: Option<Cursor>) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(64);
        let store = self.store.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut cursor = Some(since.unwrap_or_else(|| Cursor::after(chrono::Utc::now())));
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tx.closed() => return,
                    _ = ticker.tick() => {}
                }

                // Drain every page that accumulated since the last tick.
                loop {
                    let (messages, next) = match store
                        .list_messages(chat_id, cursor, STREAM_PAGE_SIZE)
                        .await
                    {
                        Ok(page) => page,
                        Err(e) => {
                            warn!(chat_id = %chat_id, error = %e, "stream poll failed, retrying next tick");
                            break;
                        }
                    };

                    for message in messages {
                        cursor = Some(Cursor::of(&message));
                        if tx.send(message).await.is_err() {
                            return;
                        }
                    }

                    if next.is_none() {
                        break;
                    }
                }
            }
        });

        rx
    }

    /// Idempotent translation patch, exposed for the update consumer.
    pub async fn update_message_translation(
        &self,
        message_id: Uuid,
        translated_content: &str,
    ) -> ChatResult<()> {
        self.store
            .update_message_translation(message_id, translated_content)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryChatStore;
    use async_trait::async_trait;
    use event_channel::{ChannelError, MemoryChannel, Subscription};

    fn service() -> (ChatService, MemoryChannel) {
        let channel = MemoryChannel::new();
        let service = ChatService::new(
            Arc::new(MemoryChatStore::new()),
            Arc::new(channel.clone()),
        )
        .with_poll_interval(Duration::from_millis(10));
        (service, channel)
    }

    async fn translated_chat(service: &ChatService) -> Chat {
        service
            .create_chat("alice", "bob", "en", "de")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_chat_rejects_missing_fields() {
        let (service, _) = service();
        let err = service.create_chat("alice", "bob", "", "de").await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn send_message_rejects_empty_content_before_side_effects() {
        let (service, channel) = service();
        let chat = translated_chat(&service).await;

        let err = service
            .send_message(chat.chat_id, "alice", "bob", "")
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::InvalidArgument(_)));
        assert_eq!(channel.published_count(TOPIC_MESSAGE_SENT), 0);
    }

    #[tokio::test]
    async fn send_message_to_unknown_chat_is_not_found() {
        let (service, _) = service();
        let err = service
            .send_message(Uuid::new_v4(), "alice", "bob", "Hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ChatNotFound(_)));
    }

    #[tokio::test]
    async fn cross_language_send_publishes_message_sent() {
        let (service, channel) = service();
        let chat = translated_chat(&service).await;
        let mut sub = channel
            .subscribe(TOPIC_MESSAGE_SENT, "test-observer")
            .await
            .unwrap();

        let message = service
            .send_message(chat.chat_id, "alice", "bob", "Hello")
            .await
            .unwrap();
        assert!(!message.translated);
        assert_eq!(message.translated_content, "");

        let delivery = sub.recv().await.unwrap();
        let envelope = EventEnvelope::<MessageSentEvent>::from_json(&delivery.payload).unwrap();
        assert_eq!(envelope.data.message_id, message.message_id);
        assert_eq!(envelope.data.content, "Hello");
        assert_eq!(envelope.data.source_lang, "en");
        assert_eq!(envelope.data.target_lang, "de");
    }

    #[tokio::test]
    async fn same_language_send_publishes_nothing() {
        let (service, channel) = service();
        let chat = service
            .create_chat("alice", "bob", "en", "en")
            .await
            .unwrap();

        service
            .send_message(chat.chat_id, "alice", "bob", "Hello")
            .await
            .unwrap();

        assert_eq!(channel.published_count(TOPIC_MESSAGE_SENT), 0);
    }

    struct UnavailableChannel;

    #[async_trait]
    impl EventChannel for UnavailableChannel {
        async fn publish(
            &self,
            topic: &str,
            _key: &str,
            _payload: &[u8],
        ) -> Result<(), ChannelError> {
            Err(ChannelError::Publish {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            })
        }

        async fn subscribe(
            &self,
            topic: &str,
            _group: &str,
        ) -> Result<Box<dyn Subscription>, ChannelError> {
            Err(ChannelError::Subscribe {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn publish_failure_fails_the_send_but_keeps_the_message() {
        let store = Arc::new(MemoryChatStore::new());
        let service = ChatService::new(store.clone(), Arc::new(UnavailableChannel));
        let chat = translated_chat(&service).await;

        let err = service
            .send_message(chat.chat_id, "alice", "bob", "Hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Channel(_)));

        // The message was durably stored before the publish attempt.
        let (messages, _) = store.list_messages(chat.chat_id, None, 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Hello");
    }

    #[tokio::test]
    async fn list_messages_pages_through_tokens() {
        let (service, _) = service();
        let chat = translated_chat(&service).await;
        for i in 0..5 {
            service
                .send_message(chat.chat_id, "alice", "bob", &format!("msg-{i}"))
                .await
                .unwrap();
        }

        let (first, token) = service
            .list_messages(chat.chat_id, None, 3, None)
            .await
            .unwrap();
        assert_eq!(first.len(), 3);
        let token = token.expect("more pages expected");

        let (rest, end) = service
            .list_messages(chat.chat_id, None, 3, Some(&token))
            .await
            .unwrap();
        assert_eq!(rest.len(), 2);
        assert!(end.is_none());

        let contents: Vec<&str> = first
            .iter()
            .chain(rest.iter())
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["msg-0", "msg-1", "msg-2", "msg-3", "msg-4"]);
    }

    #[tokio::test]
    async fn malformed_page_token_is_rejected() {
        let (service, _) = service();
        let chat = translated_chat(&service).await;
        let err = service
            .list_messages(chat.chat_id, None, 10, Some("not-a-cursor"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn stream_delivers_appended_messages_in_order() {
        let (service, _) = service();
        let chat = translated_chat(&service).await;

        let since = Cursor::after(chrono::Utc::now());
        let mut stream = service.stream_messages(chat.chat_id, Some(since));

        service
            .send_message(chat.chat_id, "alice", "bob", "first")
            .await
            .unwrap();
        service
            .send_message(chat.chat_id, "bob", "alice", "second")
            .await
            .unwrap();

        // Both arrive within two polling intervals.
        let deadline = Duration::from_millis(40);
        let first = tokio::time::timeout(deadline, stream.recv())
            .await
            .expect("first message within two intervals")
            .expect("stream open");
        let second = tokio::time::timeout(deadline, stream.recv())
            .await
            .expect("second message within two intervals")
            .expect("stream open");

        assert_eq!(first.content, "first");
        assert_eq!(second.content, "second");
    }

    #[tokio::test]
    async fn dropping_the_receiver_cancels_the_stream() {
        let (service, _) = service();
        let chat = translated_chat(&service).await;

        let stream = service.stream_messages(chat.chat_id, None);
        drop(stream);

        // New messages go nowhere; the poll task observes the closed
        // receiver and exits instead of panicking.
        service
            .send_message(chat.chat_id, "alice", "bob", "after cancel")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn update_message_translation_round_trip() {
        let (service, _) = service();
        let chat = translated_chat(&service).await;
        let message = service
            .send_message(chat.chat_id, "alice", "bob", "Hello")
            .await
            .unwrap();

        service
            .update_message_translation(message.message_id, "Hallo")
            .await
            .unwrap();

        let stored = service.get_message(message.message_id).await.unwrap();
        assert!(stored.translated);
        assert_eq!(stored.translated_content, "Hallo");
    }
}
