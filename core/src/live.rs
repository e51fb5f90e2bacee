/// Live ingester: turns broadcast deliveries into feed merges
use crate::broadcast::Subscription;
use crate::message::{Origin, WireMessage};
use crate::state::SessionState;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What happened to one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Inserted into the feed
    Merged,
    /// Already present (or older than everything kept), feed unchanged
    Duplicate,
    /// Echo of our own send, discarded
    Loopback,
    /// Undecodable or incomplete payload, discarded
    Malformed,
}

#[derive(Clone)]
pub struct LiveIngester {
    state: Arc<SessionState>,
}

impl LiveIngester {
    pub fn new(state: Arc<SessionState>) -> Self {
        Self { state }
    }

    /// Handle one delivered payload. Safe to call again with a payload already handled.
    pub async fn handle_delivery(&self, payload: &[u8]) -> Delivery {
        let wire = match WireMessage::decode(payload) {
            Some(wire) => wire,
            None => {
                debug!("Dropping malformed live payload ({} bytes)", payload.len());
                return Delivery::Malformed;
            }
        };

        // Our own sends were inserted optimistically; the echo must not be merged or reclassified
        if let Some(local_id) = self.state.local_id().await {
            if wire.sender_id == local_id {
                debug!("Suppressed loopback of {}", wire.id);
                return Delivery::Loopback;
            }
        }

        let id = wire.id.clone();
        if self.state.merge(vec![wire.into_message(Origin::Peer)]).await > 0 {
            debug!("Live message {} merged", id);
            Delivery::Merged
        } else {
            Delivery::Duplicate
        }
    }

    /// Consume the subscription until the transport closes it or shutdown is signalled.
    /// The subscription is dropped (released) when this returns.
    pub async fn run(self, mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!("Live ingester listening on {}", subscription.topic());
        self.state.set_ready(true);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                delivery = subscription.next() => {
                    match delivery {
                        Some(payload) => {
                            self.handle_delivery(&payload).await;
                        }
                        None => {
                            warn!("Subscription to {} closed by transport", subscription.topic());
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    // Sender dropped counts as shutdown too
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.state.set_ready(false);
        info!("Live ingester stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Feed, OrderingPolicy};
    use crate::identity::LocalIdentity;
    use crate::message::{MessageKind, SenderProfile};
    use crate::snapshot::SnapshotCache;

    fn payload(id: &str, sender: &str) -> Vec<u8> {
        serde_json::to_vec(&WireMessage {
            id: id.to_string(),
            text: "hey".to_string(),
            sender_id: sender.to_string(),
            sender_profile: SenderProfile::new(sender),
            timestamp: 10,
            kind: MessageKind::Text,
        })
        .unwrap()
    }

    fn ingester() -> LiveIngester {
        let state = SessionState::new(
            Feed::new(OrderingPolicy::Chronological, 10),
            SnapshotCache::temporary("feed").unwrap(),
            16,
        );
        LiveIngester::new(Arc::new(state))
    }

    #[tokio::test]
    async fn test_delivery_classification() {
        let live = ingester();
        live.state
            .set_identity(LocalIdentity::new("me", SenderProfile::new("Me")))
            .await;

        assert_eq!(live.handle_delivery(&payload("1", "peer")).await, Delivery::Merged);
        assert_eq!(live.handle_delivery(&payload("1", "peer")).await, Delivery::Duplicate);
        assert_eq!(live.handle_delivery(&payload("2", "me")).await, Delivery::Loopback);
        assert_eq!(live.handle_delivery(b"[]").await, Delivery::Malformed);

        let feed = live.state.feed().await;
        assert_eq!(feed.ids(), vec!["1"]);
        assert_eq!(feed.get("1").unwrap().origin, Origin::Peer);
    }

    #[tokio::test]
    async fn test_unknown_identity_treats_everything_as_peer() {
        let live = ingester();
        assert_eq!(live.handle_delivery(&payload("1", "me")).await, Delivery::Merged);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let live = ingester();
        let state = live.state.clone();
        let (tx, rx) = tokio::sync::broadcast::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(live.run(Subscription::new("room", rx), shutdown_rx));
        tx.send(bytes::Bytes::from(payload("1", "peer"))).unwrap();

        for _ in 0..100 {
            if state.feed().await.contains("1") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(state.is_ready());

        shutdown_tx.send_replace(true);
        handle.await.unwrap();
        assert!(!state.is_ready());
        assert_eq!(tx.receiver_count(), 0);
    }
}
