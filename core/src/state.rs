/// Shared session state: the single serialization point for every feed mutation
use crate::events::FeedEvent;
use crate::feed::Feed;
use crate::identity::LocalIdentity;
use crate::message::Message;
use crate::snapshot::SnapshotCache;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

pub struct SessionState {
    feed: RwLock<Feed>,
    cache: SnapshotCache,
    identity: RwLock<Option<LocalIdentity>>,
    events: broadcast::Sender<FeedEvent>,
    ready: AtomicBool,
    history_loaded: AtomicBool,
    closed: AtomicBool,
}

impl SessionState {
    pub fn new(feed: Feed, cache: SnapshotCache, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            feed: RwLock::new(feed),
            cache,
            identity: RwLock::new(None),
            events,
            ready: AtomicBool::new(false),
            history_loaded: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Merge messages into the feed and mirror the result to the snapshot cache.
    ///
    /// Returns how many messages were inserted. A no-op once the session is closed.
    pub async fn merge(&self, incoming: Vec<Message>) -> usize {
        if incoming.is_empty() || self.is_closed() {
            return 0;
        }

        let mut feed = self.feed.write().await;
        let next = feed.merge(incoming);
        if next == *feed {
            return 0;
        }

        let before: HashSet<&str> = feed.messages().iter().map(|m| m.id.as_str()).collect();
        let added = next
            .messages()
            .iter()
            .filter(|m| !before.contains(m.id.as_str()))
            .count();
        drop(before);

        *feed = next;

        // Saved under the write guard so an older state never overwrites a newer one.
        // Only an in-memory sled insert; fsync happens in the background or on shutdown.
        if let Err(e) = self.cache.save(&feed) {
            warn!("Snapshot cache write failed: {}", e);
        }

        debug!("Merged {} new messages, feed now {}", added, feed.len());
        self.emit(FeedEvent::FeedUpdated {
            len: feed.len(),
            added,
        });
        added
    }

    /// Push pending snapshot writes to disk off the async workers (best-effort)
    pub async fn flush_cache(&self) {
        let cache = self.cache.clone();
        match tokio::task::spawn_blocking(move || cache.flush()).await {
            Ok(Ok(())) => debug!("Snapshot cache flushed"),
            Ok(Err(e)) => warn!("Snapshot cache flush failed: {}", e),
            Err(e) => warn!("Snapshot cache flush task failed: {}", e),
        }
    }

    pub async fn feed(&self) -> Feed {
        self.feed.read().await.clone()
    }

    pub async fn identity(&self) -> Option<LocalIdentity> {
        self.identity.read().await.clone()
    }

    pub async fn local_id(&self) -> Option<String> {
        self.identity.read().await.as_ref().map(|i| i.peer_id.clone())
    }

    /// Record the local identity. Returns true the first time an identity is set.
    pub async fn set_identity(&self, identity: LocalIdentity) -> bool {
        let mut slot = self.identity.write().await;
        let first = slot.is_none();
        *slot = Some(identity);
        first
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: FeedEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        let was = self.ready.swap(ready, Ordering::SeqCst);
        if was != ready {
            self.emit(if ready {
                FeedEvent::Ready
            } else {
                FeedEvent::Disconnected
            });
        }
    }

    pub fn history_loaded(&self) -> bool {
        self.history_loaded.load(Ordering::SeqCst)
    }

    pub fn mark_history_loaded(&self, received: usize, added: usize) {
        self.history_loaded.store(true, Ordering::SeqCst);
        self.emit(FeedEvent::HistoryLoaded { received, added });
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
