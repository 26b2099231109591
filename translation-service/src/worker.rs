//! Inbound consumer: turns `message.sent` events into `message.translated`
//! events.
//!
//! The loop never stops on a single bad event. A translation failure routes
//! the original envelope to the dead-letter topic and emits a
//! `success = false` outcome so the chat side can observe it; duplicate
//! deliveries are absorbed by the engine's cache and the idempotent update
//! downstream. A delivery is acknowledged only once its outcome has been
//! published, so a crash mid-translation replays the event.

use std::sync::Arc;
use std::time::Duration;

use event_channel::{ChannelError, Delivery, EventChannel};
use event_schema::{
    EventEnvelope, MessageSentEvent, MessageTranslatedEvent, TOPIC_MESSAGE_SENT,
    TOPIC_MESSAGE_SENT_DLQ, TOPIC_MESSAGE_TRANSLATED,
};
use tracing::{error, info, warn};

use crate::engine::TranslationEngine;
use crate::error::AppError;

const SOURCE: &str = "translation-service";
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

pub struct TranslationWorker {
    channel: Arc<dyn EventChannel>,
    engine: Arc<TranslationEngine>,
    group: String,
}

impl TranslationWorker {
    pub fn new(
        channel: Arc<dyn EventChannel>,
        engine: Arc<TranslationEngine>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            engine,
            group: group.into(),
        }
    }

    /// Consume until the channel closes. Transport errors trigger a
    /// resubscribe with a short delay; handler errors are logged and the
    /// loop moves on to the next event.
    pub async fn run(&self) {
        loop {
            let mut sub = match self.channel.subscribe(TOPIC_MESSAGE_SENT, &self.group).await {
                Ok(sub) => sub,
                Err(e) => {
                    error!(error = %e, "failed to subscribe to {TOPIC_MESSAGE_SENT}, retrying");
                    tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                    continue;
                }
            };
            info!(topic = TOPIC_MESSAGE_SENT, group = %self.group, "translation worker consuming");

            loop {
                match sub.recv().await {
                    Ok(delivery) => match self.handle(&delivery).await {
                        Ok(()) => {
                            if let Err(e) = sub.ack().await {
                                warn!(key = %delivery.key, error = %e, "failed to acknowledge delivery");
                            }
                        }
                        // Left unacknowledged: redelivered after a restart.
                        Err(e) => {
                            error!(key = %delivery.key, error = %e, "failed to handle message.sent event");
                        }
                    },
                    Err(ChannelError::Closed) => {
                        info!("channel closed, stopping translation worker");
                        return;
                    }
                    Err(e) => {
                        error!(error = %e, "receive failed, resubscribing");
                        break;
                    }
                }
            }

            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
        }
    }

    async fn handle(&self, delivery: &Delivery) -> Result<(), AppError> {
        let envelope = match EventEnvelope::<MessageSentEvent>::from_json(&delivery.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Undecodable events can never succeed; park them for inspection.
                warn!(key = %delivery.key, error = %e, "malformed message.sent event, routing to dead letter");
                self.channel
                    .publish(TOPIC_MESSAGE_SENT_DLQ, &delivery.key, &delivery.payload)
                    .await?;
                return Ok(());
            }
        };
        let event = &envelope.data;

        match self
            .engine
            .translate(&event.content, &event.source_lang, &event.target_lang)
            .await
        {
            Ok(translated_content) => {
                self.publish_outcome(MessageTranslatedEvent {
                    message_id: event.message_id,
                    translated_content,
                    success: true,
                })
                .await
            }
            Err(e) => {
                warn!(
                    message_id = %event.message_id,
                    error = %e,
                    "translation failed, routing event to dead letter"
                );
                self.channel
                    .publish(TOPIC_MESSAGE_SENT_DLQ, &delivery.key, &delivery.payload)
                    .await?;
                self.publish_outcome(MessageTranslatedEvent {
                    message_id: event.message_id,
                    translated_content: String::new(),
                    success: false,
                })
                .await
            }
        }
    }

    async fn publish_outcome(&self, outcome: MessageTranslatedEvent) -> Result<(), AppError> {
        let key = outcome.message_id.to_string();
        let payload = EventEnvelope::new(SOURCE, outcome).to_json()?;
        self.channel
            .publish(TOPIC_MESSAGE_TRANSLATED, &key, &payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::translator::{Translator, TranslatorError};
    use async_trait::async_trait;
    use event_channel::MemoryChannel;
    use uuid::Uuid;

    struct UppercaseTranslator;

    #[async_trait]
    impl Translator for UppercaseTranslator {
        async fn translate(
            &self,
            text: &str,
            _source_lang: &str,
            _target_lang: &str,
        ) -> Result<String, TranslatorError> {
            Ok(text.to_uppercase())
        }
    }

    struct BrokenTranslator;

    #[async_trait]
    impl Translator for BrokenTranslator {
        async fn translate(
            &self,
            _text: &str,
            _source_lang: &str,
            _target_lang: &str,
        ) -> Result<String, TranslatorError> {
            Err(TranslatorError::Backend("backend down".to_string()))
        }
    }

    fn worker_with(
        channel: &MemoryChannel,
        translator: Arc<dyn Translator>,
    ) -> TranslationWorker {
        let engine = Arc::new(TranslationEngine::new(translator, EngineConfig::default()));
        TranslationWorker::new(Arc::new(channel.clone()), engine, "translation-workers")
    }

    fn sent_event() -> MessageSentEvent {
        MessageSentEvent {
            message_id: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            content: "hello".to_string(),
            source_lang: "en".to_string(),
            target_lang: "de".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_translation_publishes_outcome() {
        let channel = MemoryChannel::new();
        let worker = worker_with(&channel, Arc::new(UppercaseTranslator));
        let mut outcomes = channel
            .subscribe(TOPIC_MESSAGE_TRANSLATED, "test-observer")
            .await
            .unwrap();

        let event = sent_event();
        let payload = EventEnvelope::new("chat-service", event.clone())
            .to_json()
            .unwrap();
        worker
            .handle(&Delivery {
                key: event.message_id.to_string(),
                payload,
            })
            .await
            .unwrap();

        let delivery = outcomes.recv().await.unwrap();
        let outcome =
            EventEnvelope::<MessageTranslatedEvent>::from_json(&delivery.payload).unwrap();
        assert!(outcome.data.success);
        assert_eq!(outcome.data.message_id, event.message_id);
        assert_eq!(outcome.data.translated_content, "HELLO");
        assert_eq!(channel.published_count(TOPIC_MESSAGE_SENT_DLQ), 0);
    }

    #[tokio::test]
    async fn failed_translation_goes_to_dead_letter_with_failure_outcome() {
        let channel = MemoryChannel::new();
        let worker = worker_with(&channel, Arc::new(BrokenTranslator));
        let mut outcomes = channel
            .subscribe(TOPIC_MESSAGE_TRANSLATED, "test-observer")
            .await
            .unwrap();
        let mut dead_letters = channel
            .subscribe(TOPIC_MESSAGE_SENT_DLQ, "test-observer")
            .await
            .unwrap();

        let event = sent_event();
        let payload = EventEnvelope::new("chat-service", event.clone())
            .to_json()
            .unwrap();
        worker
            .handle(&Delivery {
                key: event.message_id.to_string(),
                payload: payload.clone(),
            })
            .await
            .unwrap();

        // The original envelope is preserved for reprocessing.
        let parked = dead_letters.recv().await.unwrap();
        assert_eq!(parked.payload, payload);

        let outcome = EventEnvelope::<MessageTranslatedEvent>::from_json(
            &outcomes.recv().await.unwrap().payload,
        )
        .unwrap();
        assert!(!outcome.data.success);
        assert!(outcome.data.translated_content.is_empty());
    }

    #[tokio::test]
    async fn deliveries_are_acknowledged_only_after_processing() {
        let channel = MemoryChannel::new();
        let worker = worker_with(&channel, Arc::new(UppercaseTranslator));
        let mut outcomes = channel
            .subscribe(TOPIC_MESSAGE_TRANSLATED, "test-observer")
            .await
            .unwrap();
        tokio::spawn(async move { worker.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let event = sent_event();
        let payload = EventEnvelope::new("chat-service", event.clone())
            .to_json()
            .unwrap();
        channel
            .publish(TOPIC_MESSAGE_SENT, &event.message_id.to_string(), &payload)
            .await
            .unwrap();

        // The outcome exists before the delivery is marked processed.
        outcomes.recv().await.unwrap();
        for _ in 0..50 {
            if channel.acked_count(TOPIC_MESSAGE_SENT, "translation-workers") == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("delivery never acknowledged");
    }

    #[tokio::test]
    async fn malformed_events_are_parked_not_fatal() {
        let channel = MemoryChannel::new();
        let worker = worker_with(&channel, Arc::new(UppercaseTranslator));

        worker
            .handle(&Delivery {
                key: "bogus".to_string(),
                payload: b"not json".to_vec(),
            })
            .await
            .unwrap();

        assert_eq!(channel.published_count(TOPIC_MESSAGE_SENT_DLQ), 1);
        assert_eq!(channel.published_count(TOPIC_MESSAGE_TRANSLATED), 0);
    }
}
