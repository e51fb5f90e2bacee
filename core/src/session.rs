/// Feed session: owns the feed for one client and wires the three producers to it
use crate::broadcast::BroadcastChannel;
use crate::config::Config;
use crate::error::{FeedError, Result};
use crate::events::FeedEvent;
use crate::feed::Feed;
use crate::history::{reconcile, HistorySource};
use crate::identity::LocalIdentity;
use crate::live::LiveIngester;
use crate::outbound::{OutboundSender, Sent};
use crate::persistence::PersistenceWriter;
use crate::snapshot::SnapshotCache;
use crate::state::SessionState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Outcome of the one-shot history pull
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySync {
    /// Rows returned by the store (0 when the fetch failed)
    pub received: usize,
    /// Messages actually inserted into the feed
    pub added: usize,
}

/// Run the history pull once against the current feed.
///
/// A failed or timed out fetch is treated as an empty result, so existing content is kept.
async fn pull_history(
    state: Arc<SessionState>,
    source: Arc<dyn HistorySource>,
    limit: Duration,
) -> Option<HistorySync> {
    let local_id = state.local_id().await?;

    let records = match timeout(limit, source.fetch_history()).await {
        Ok(Ok(records)) => records,
        Ok(Err(e)) => {
            warn!("History fetch failed, keeping current feed: {}", e);
            Vec::new()
        }
        Err(_) => {
            warn!("History fetch timed out after {:?}, keeping current feed", limit);
            Vec::new()
        }
    };

    let received = records.len();
    let added = state.merge(reconcile(&records, &local_id)).await;
    state.mark_history_loaded(received, added);
    info!("History loaded: {} rows, {} new messages", received, added);

    Some(HistorySync { received, added })
}

/// One client's view of the shared feed
pub struct FeedSession {
    config: Config,
    state: Arc<SessionState>,
    channel: Arc<dyn BroadcastChannel>,
    history: Arc<dyn HistorySource>,
    sender: OutboundSender,
    history_started: AtomicBool,
    history_task: Mutex<Option<JoinHandle<Option<HistorySync>>>>,
    ingester: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl FeedSession {
    /// Create a session, hydrating the feed from the snapshot cache
    pub fn new(
        config: Config,
        cache: SnapshotCache,
        channel: Arc<dyn BroadcastChannel>,
        history: Arc<dyn HistorySource>,
        writer: Arc<dyn PersistenceWriter>,
    ) -> Self {
        let feed = cache.load(config.ordering, config.capacity);
        info!(
            "Feed session on {} hydrated with {} cached messages",
            config.topic,
            feed.len()
        );

        let state = Arc::new(SessionState::new(feed, cache, config.event_buffer));
        let sender = OutboundSender::new(
            state.clone(),
            channel.clone(),
            writer,
            config.topic.clone(),
        );
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            state,
            channel,
            history,
            sender,
            history_started: AtomicBool::new(false),
            history_task: Mutex::new(None),
            ingester: Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Open the snapshot cache described by `config` (on disk when `data_dir` is set)
    pub fn open_cache(config: &Config) -> Result<SnapshotCache> {
        match &config.data_dir {
            Some(dir) => SnapshotCache::open(dir, &config.cache_key),
            None => SnapshotCache::temporary(&config.cache_key),
        }
    }

    /// Acquire the live subscription and start ingesting.
    ///
    /// A subscribe failure is returned but leaves the session usable; calling `start` again
    /// retries. Calling it while the ingester is running is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.state.is_closed() {
            return Err(FeedError::Transport("session is shut down".to_string()));
        }

        let mut ingester = self.ingester.lock().await;
        if let Some(handle) = ingester.take() {
            if !handle.is_finished() && self.state.is_ready() {
                debug!("Live ingester already running");
                *ingester = Some(handle);
                return Ok(());
            }
            // Previous subscription ended; let its task wind down before resubscribing
            if let Err(e) = handle.await {
                warn!("Previous live ingester ended abnormally: {}", e);
            }
        }

        let subscription = self.channel.subscribe(&self.config.topic).await.map_err(|e| {
            warn!("Live subscription to {} failed: {}", self.config.topic, e);
            e
        })?;

        let live = LiveIngester::new(self.state.clone());
        let shutdown_rx = self.shutdown_tx.subscribe();
        // Readiness flips before returning so callers observe it synchronously
        self.state.set_ready(true);
        *ingester = Some(tokio::spawn(live.run(subscription, shutdown_rx)));
        Ok(())
    }

    /// Record the local identity. The first identity triggers the one-shot history pull.
    pub async fn set_identity(&self, identity: LocalIdentity) {
        info!("Local participant is {}", identity.peer_id);
        self.state.set_identity(identity).await;

        let mut task_slot = self.history_task.lock().await;
        if self.history_started.swap(true, Ordering::SeqCst) {
            return;
        }

        *task_slot = Some(tokio::spawn(pull_history(
            self.state.clone(),
            self.history.clone(),
            self.config.history_timeout,
        )));
    }

    /// Wait for the history pull, running it inline when it has not been started.
    ///
    /// Returns `None` when the identity is still unknown or the pull already completed and
    /// was awaited before.
    pub async fn sync_history(&self) -> Option<HistorySync> {
        let mut task_slot = self.history_task.lock().await;
        if let Some(task) = task_slot.take() {
            drop(task_slot);
            return task.await.ok().flatten();
        }

        if self.state.local_id().await.is_none() {
            debug!("History pull deferred, local identity not known yet");
            return None;
        }

        if self.history_started.swap(true, Ordering::SeqCst) {
            return None;
        }

        pull_history(
            self.state.clone(),
            self.history.clone(),
            self.config.history_timeout,
        )
        .await
    }

    /// Send a message as the local participant (see [`OutboundSender::send`])
    pub async fn send(&self, text: &str) -> Option<Sent> {
        self.sender.send(text).await
    }

    /// Current feed contents
    pub async fn feed(&self) -> Feed {
        self.state.feed().await
    }

    pub async fn identity(&self) -> Option<LocalIdentity> {
        self.state.identity().await
    }

    /// True while the live subscription is active
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// True once the history pull has finished, whether or not it succeeded
    pub fn history_loaded(&self) -> bool {
        self.state.history_loaded()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FeedEvent> {
        self.state.subscribe_events()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop the ingester, release the subscription and flush the snapshot cache. Idempotent.
    pub async fn shutdown(&self) {
        self.state.close();
        self.shutdown_tx.send_replace(true);

        if let Some(handle) = self.ingester.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("Live ingester ended abnormally: {}", e);
            }
        }
        self.state.set_ready(false);
        self.state.flush_cache().await;
        info!("Feed session on {} shut down", self.config.topic);
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.state.close();
        self.shutdown_tx.send_replace(true);
    }
}
