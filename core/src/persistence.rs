/// Durable write side: the fire-and-forget insert issued after every local send
use crate::error::Result;
use crate::message::SenderProfile;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Durable storage write call
#[async_trait]
pub trait PersistenceWriter: Send + Sync {
    async fn insert(&self, content: &str, profile: &SenderProfile, sender_id: &str) -> Result<()>;
}

/// Issue an at-most-once, best-effort durable write on a background task.
///
/// There is no retry: a failed write is logged and the message only survives in the feed,
/// the snapshot cache and whatever peers received the broadcast.
pub fn spawn_write(
    writer: Arc<dyn PersistenceWriter>,
    content: String,
    profile: SenderProfile,
    sender_id: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match writer.insert(&content, &profile, &sender_id).await {
            Ok(()) => debug!("Persisted message from {}", sender_id),
            Err(e) => warn!("Durable write failed, message not persisted: {}", e),
        }
    })
}
