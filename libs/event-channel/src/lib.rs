//! Durable topic/queue abstraction used to hand work between services.
//!
//! Semantics are at-least-once: a published event is delivered to every
//! consumer group subscribed to its topic, and a given delivery may be seen
//! more than once after crashes or rebalances. Consumers are expected to be
//! idempotent.
//!
//! Two implementations are provided: [`KafkaChannel`] for deployments and
//! [`MemoryChannel`] for tests and single-process setups.

mod error;
mod kafka;
mod memory;

pub use error::ChannelError;
pub use kafka::KafkaChannel;
pub use memory::MemoryChannel;

use async_trait::async_trait;

/// A single event taken off a topic.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Partitioning key the event was published with (usually the message id).
    pub key: String,
    /// JSON-encoded event envelope.
    pub payload: Vec<u8>,
}

/// Publish/subscribe handle shared by all services.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Publish one event to `topic`. Returns only after the channel has
    /// accepted the event durably; an error means the event was not handed
    /// off and the caller still owns it.
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), ChannelError>;

    /// Join `group` as a consumer of `topic`. Consumers in the same group
    /// compete for deliveries; distinct groups each see every event.
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn Subscription>, ChannelError>;
}

/// An active consumer-group membership on one topic.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next delivery. `ChannelError::Closed` means the channel
    /// is gone and the consumer loop should terminate.
    async fn recv(&mut self) -> Result<Delivery, ChannelError>;

    /// Mark the most recent delivery as fully processed. The group's
    /// position only advances past acknowledged deliveries, so an event the
    /// consumer crashed on is seen again after a restart.
    async fn ack(&mut self) -> Result<(), ChannelError>;
}
