//! Update consumer: applies `message.translated` outcomes to the store.
//!
//! Deliveries are at-least-once, so everything here is tolerant of
//! duplicates and stale events: re-applied translations are no-ops, unknown
//! message ids and conflicting stale texts are logged and dropped, and
//! `success = false` outcomes never touch `translated_content`. One bad
//! event never halts the loop, and a delivery is acknowledged only after
//! the store accepted it, so a crash mid-update replays the event.

use std::sync::Arc;
use std::time::Duration;

use event_channel::{ChannelError, Delivery, EventChannel};
use event_schema::{EventEnvelope, MessageTranslatedEvent, TOPIC_MESSAGE_TRANSLATED};
use tracing::{error, info, warn};

use crate::error::{ChatError, ChatResult};
use crate::store::ChatStore;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

pub struct TranslatedEventConsumer {
    store: Arc<dyn ChatStore>,
    channel: Arc<dyn EventChannel>,
    group: String,
}

impl TranslatedEventConsumer {
    pub fn new(
        store: Arc<dyn ChatStore>,
        channel: Arc<dyn EventChannel>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            store,
            channel,
            group: group.into(),
        }
    }

    /// Consume until the channel closes. Transport errors trigger a
    /// resubscribe with a short delay.
    pub async fn run(&self) {
        loop {
            let mut sub = match self
                .channel
                .subscribe(TOPIC_MESSAGE_TRANSLATED, &self.group)
                .await
            {
                Ok(sub) => sub,
                Err(e) => {
                    error!(error = %e, "failed to subscribe to {TOPIC_MESSAGE_TRANSLATED}, retrying");
                    tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                    continue;
                }
            };
            info!(topic = TOPIC_MESSAGE_TRANSLATED, group = %self.group, "update consumer running");

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
                            error!(key = %delivery.key, error = %e, "failed to apply translation update");
                        }
                    },
                    Err(ChannelError::Closed) => {
                        info!("channel closed, stopping update consumer");
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

    async fn handle(&self, delivery: &Delivery) -> ChatResult<()> {
        let envelope = match EventEnvelope::<MessageTranslatedEvent>::from_json(&delivery.payload)
        {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key = %delivery.key, error = %e, "malformed message.translated event, dropping");
                return Ok(());
            }
        };
        let event = envelope.data;

        if !event.success {
            warn!(
                message_id = %event.message_id,
                "translation failed upstream, leaving message untranslated"
            );
            return Ok(());
        }

        match self
            .store
            .update_message_translation(event.message_id, &event.translated_content)
            .await
        {
            Ok(()) => {
                info!(message_id = %event.message_id, "translation applied");
                Ok(())
            }
            // The message may not exist here yet, or the event is stale.
            Err(ChatError::MessageNotFound(id)) => {
                warn!(message_id = %id, "translation for unknown message, dropping");
                Ok(())
            }
            // First write wins; a differing late event is stale by definition.
            Err(ChatError::TranslationConflict(id)) => {
                warn!(message_id = %id, "conflicting translation rejected, keeping first write");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
