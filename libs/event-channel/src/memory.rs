use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{ChannelError, Delivery, EventChannel, Subscription};

struct GroupQueue {
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>>,
    acked: Arc<AtomicU64>,
}

#[derive(Default)]
struct TopicState {
    groups: HashMap<String, GroupQueue>,
    published: u64,
}

/// In-process channel with the same delivery semantics as the Kafka-backed
/// one: every group sees every event published after it subscribed, and
/// consumers within a group compete for deliveries.
///
/// Events published to a topic before any group joined are counted but not
/// retained.
#[derive(Default, Clone)]
pub struct MemoryChannel {
    topics: Arc<Mutex<HashMap<String, TopicState>>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events published to `topic` so far. Test hook.
    pub fn published_count(&self, topic: &str) -> u64 {
        self.topics
            .lock()
            .expect("memory channel lock poisoned")
            .get(topic)
            .map(|t| t.published)
            .unwrap_or(0)
    }

    /// Number of deliveries `group` has acknowledged on `topic`. Test hook.
    pub fn acked_count(&self, topic: &str, group: &str) -> u64 {
        self.topics
            .lock()
            .expect("memory channel lock poisoned")
            .get(topic)
            .and_then(|t| t.groups.get(group))
            .map(|g| g.acked.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventChannel for MemoryChannel {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), ChannelError> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| ChannelError::Receive("memory channel lock poisoned".to_string()))?;

        let state = topics.entry(topic.to_string()).or_default();
        state.published += 1;

        for group in state.groups.values() {
            // A dropped subscription is not a publish failure.
            let _ = group.tx.send(Delivery {
                key: key.to_string(),
                payload: payload.to_vec(),
            });
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn Subscription>, ChannelError> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| ChannelError::Receive("memory channel lock poisoned".to_string()))?;

        let state = topics.entry(topic.to_string()).or_default();
        let queue = state.groups.entry(group.to_string()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            GroupQueue {
                tx,
                rx: Arc::new(tokio::sync::Mutex::new(rx)),
                acked: Arc::new(AtomicU64::new(0)),
            }
        });

        Ok(Box::new(MemorySubscription {
            queue: queue.rx.clone(),
            acked: queue.acked.clone(),
        }))
    }
}

struct MemorySubscription {
    queue: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>>,
    acked: Arc<AtomicU64>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn recv(&mut self) -> Result<Delivery, ChannelError> {
        let mut rx = self.queue.lock().await;
        rx.recv().await.ok_or(ChannelError::Closed)
    }

    async fn ack(&mut self) -> Result<(), ChannelError> {
        self.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
