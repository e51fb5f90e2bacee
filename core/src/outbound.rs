/// Outbound sender: optimistic local insert, broadcast, fire-and-forget durable write
use crate::broadcast::BroadcastChannel;
use crate::message::{Message, MessageKind, Origin};
use crate::persistence::{spawn_write, PersistenceWriter};
use crate::state::SessionState;
use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const ID_SUFFIX_LEN: usize = 8;

/// Mint a locally unique message id from a microsecond clock value and a random suffix.
///
/// The `-` separator keeps these ids out of the integer id space used by durable storage,
/// but nothing coordinates the two namespaces.
pub fn mint_message_id(clock_micros: i64) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("{}-{}", clock_micros, suffix)
}

/// A message that was inserted optimistically, with the background tasks it started.
/// Dropping the handles detaches the tasks; callers never need to await them.
#[derive(Debug)]
pub struct Sent {
    pub message: Message,
    pub publish: JoinHandle<()>,
    pub persist: JoinHandle<()>,
}

#[derive(Clone)]
pub struct OutboundSender {
    state: Arc<SessionState>,
    channel: Arc<dyn BroadcastChannel>,
    writer: Arc<dyn PersistenceWriter>,
    topic: String,
}

impl OutboundSender {
    pub fn new(
        state: Arc<SessionState>,
        channel: Arc<dyn BroadcastChannel>,
        writer: Arc<dyn PersistenceWriter>,
        topic: String,
    ) -> Self {
        Self {
            state,
            channel,
            writer,
            topic,
        }
    }

    /// Send `text` as the local participant.
    ///
    /// Returns `None` without side effects when no identity is known yet, the text is blank
    /// or the session is closed.
    pub async fn send(&self, text: &str) -> Option<Sent> {
        if text.trim().is_empty() || self.state.is_closed() {
            return None;
        }

        let identity = match self.state.identity().await {
            Some(identity) => identity,
            None => {
                debug!("Send skipped, local identity not known yet");
                return None;
            }
        };

        let now = chrono::Utc::now();
        let message = Message {
            id: mint_message_id(now.timestamp_micros()),
            text: text.to_string(),
            origin: Origin::Local,
            sender_id: identity.peer_id.clone(),
            sender_display: identity.profile.clone(),
            timestamp: now.timestamp_millis(),
            kind: MessageKind::Text,
        };

        // Optimistic echo before any network round trip
        self.state.merge(vec![message.clone()]).await;

        let publish = {
            let channel = self.channel.clone();
            let topic = self.topic.clone();
            let wire = message.to_wire();
            tokio::spawn(async move {
                let payload = match serde_json::to_vec(&wire) {
                    Ok(bytes) => Bytes::from(bytes),
                    Err(e) => {
                        warn!("Failed to encode message {}: {}", wire.id, e);
                        return;
                    }
                };
                if let Err(e) = channel.publish(&topic, payload).await {
                    warn!("Broadcast of {} failed: {}", wire.id, e);
                }
            })
        };

        let persist = spawn_write(
            self.writer.clone(),
            message.text.clone(),
            identity.profile,
            identity.peer_id,
        );

        Some(Sent {
            message,
            publish,
            persist,
        })
    }
}
