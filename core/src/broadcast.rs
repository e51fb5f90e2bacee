/// Publish/subscribe transport used for live delivery
use crate::error::{FeedError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

const TOPIC_BUFFER_SIZE: usize = 256;

/// Broadcast channel over named topics.
///
/// Delivery is at-least-once with no ordering guarantee across publishers, and a publisher
/// may receive its own messages back.
#[async_trait]
pub trait BroadcastChannel: Send + Sync {
    /// Join a topic. Returning `Ok` means the subscription is active.
    async fn subscribe(&self, topic: &str) -> Result<Subscription>;

    /// Publish a payload without waiting for any acknowledgment
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;
}

/// Active subscription to one topic. Dropping it releases the subscription.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: broadcast::Receiver<Bytes>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, rx: broadcast::Receiver<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            rx,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next delivered payload, or `None` once the transport has closed the topic
    pub async fn next(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Receiver is too slow: skip lagged deliveries and continue
                    warn!("Subscription to {} lagged {} deliveries", self.topic, n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process broadcast hub, one tokio broadcast channel per topic.
/// Publishers receive their own messages, like most hosted realtime services.
#[derive(Clone, Default)]
pub struct LocalBroadcast {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<Bytes>>>>,
}

impl LocalBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<Bytes> {
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_BUFFER_SIZE).0)
            .clone()
    }

    /// Number of live subscribers on a topic
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.read().await;
        topics.get(topic).map(|tx| tx.receiver_count()).unwrap_or(0)
    }

    /// Drop a topic, ending every subscription on it (simulates a transport disconnect)
    pub async fn close_topic(&self, topic: &str) {
        let mut topics = self.topics.write().await;
        if topics.remove(topic).is_some() {
            debug!("Closed topic {}", topic);
        }
    }
}

#[async_trait]
impl BroadcastChannel for LocalBroadcast {
    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        let rx = self.sender(topic).await.subscribe();
        debug!("Subscribed to topic {}", topic);
        Ok(Subscription::new(topic, rx))
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        let tx = self.sender(topic).await;
        match tx.send(payload) {
            Ok(n) => {
                debug!("Published on {} to {} subscribers", topic, n);
                Ok(())
            }
            // Nobody listening is not a failure of the publish itself
            Err(_) => Ok(()),
        }
    }
}

/// Broadcast channel that refuses every operation (transport down)
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableBroadcast;

#[async_trait]
impl BroadcastChannel for UnavailableBroadcast {
    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        Err(FeedError::Transport(format!("cannot subscribe to {}", topic)))
    }

    async fn publish(&self, topic: &str, _payload: Bytes) -> Result<()> {
        Err(FeedError::Transport(format!("cannot publish to {}", topic)))
    }
}
