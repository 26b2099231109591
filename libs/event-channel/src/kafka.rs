use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::info;

use crate::{ChannelError, Delivery, EventChannel, Subscription};

/// Kafka-backed channel.
///
/// The producer is configured for durability: idempotence enabled, all
/// replicas acknowledge, bounded in-flight requests so ordering survives
/// retries. Consumers advance their group offset only through
/// [`Subscription::ack`].
pub struct KafkaChannel {
    producer: FutureProducer,
    brokers: String,
}

impl KafkaChannel {
    pub fn new(brokers: &str) -> Result<Self, ChannelError> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "30000")
            .set("request.timeout.ms", "30000")
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "5")
            .set("retries", "5")
            .create::<FutureProducer>()
            .map_err(|e| ChannelError::Publish {
                topic: "<producer>".to_string(),
                reason: e.to_string(),
            })?;

        info!(brokers = %brokers, "kafka producer created");

        Ok(Self {
            producer,
            brokers: brokers.to_string(),
        })
    }
}

#[async_trait]
impl EventChannel for KafkaChannel {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), ChannelError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        self.producer
            .send(record, Duration::from_secs(10))
            .await
            .map_err(|(e, _)| ChannelError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn Subscription>, ChannelError> {
        // Offsets are stored only on ack, so the auto-commit timer can
        // never advance the group past an unprocessed delivery.
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "30000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| ChannelError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| ChannelError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        info!(topic = %topic, group = %group, "subscribed to kafka topic");

        Ok(Box::new(KafkaSubscription {
            consumer,
            last: None,
        }))
    }
}

struct KafkaSubscription {
    consumer: StreamConsumer,
    /// Topic, partition and offset of the delivery last handed out by
    /// `recv`, pending acknowledgement.
    last: Option<(String, i32, i64)>,
}

#[async_trait]
impl Subscription for KafkaSubscription {
    async fn recv(&mut self) -> Result<Delivery, ChannelError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| ChannelError::Receive(e.to_string()))?;

        self.last = Some((
            message.topic().to_string(),
            message.partition(),
            message.offset(),
        ));

        let key = message
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .unwrap_or_default()
            .to_string();
        let payload = message.payload().unwrap_or_default().to_vec();

        Ok(Delivery { key, payload })
    }

    async fn ack(&mut self) -> Result<(), ChannelError> {
        if let Some((topic, partition, offset)) = self.last.take() {
            self.consumer
                .store_offset(&topic, partition, offset)
                .map_err(|e| ChannelError::Commit(e.to_string()))?;
        }
        Ok(())
    }
}
