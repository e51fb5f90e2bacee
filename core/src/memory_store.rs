/// In-memory durable store: serves the history fetch and accepts persistence writes.
/// Stands in for a hosted database in the demo binary and in tests.
use crate::error::{FeedError, Result};
use crate::history::{HistoryRecord, HistorySource};
use crate::message::SenderProfile;
use crate::persistence::PersistenceWriter;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Clone)]
pub struct MemoryStore {
    rows: Arc<RwLock<Vec<HistoryRecord>>>,
    next_id: Arc<AtomicU64>,
    limit: usize,
    failing: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Store whose history fetch returns at most `limit` rows
    pub fn with_limit(limit: usize) -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            limit,
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Append raw rows as-is, oldest first
    pub async fn seed(&self, records: Vec<HistoryRecord>) {
        self.rows.write().await.extend(records);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FeedError::Storage("memory store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HistorySource for MemoryStore {
    async fn fetch_history(&self) -> Result<Vec<HistoryRecord>> {
        self.check_available()
            .map_err(|e| FeedError::History(e.to_string()))?;

        let rows = self.rows.read().await;
        Ok(rows.iter().rev().take(self.limit).cloned().collect())
    }
}

#[async_trait]
impl PersistenceWriter for MemoryStore {
    async fn insert(&self, content: &str, profile: &SenderProfile, sender_id: &str) -> Result<()> {
        self.check_available()
            .map_err(|e| FeedError::Persistence(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = HistoryRecord {
            id: Some(serde_json::Value::from(id)),
            content: Some(content.to_string()),
            sender_id: Some(sender_id.to_string()),
            sender_name: Some(profile.username.clone()),
            sender_profile: Some(profile.clone()),
            created_at: Some(serde_json::Value::String(chrono::Utc::now().to_rfc3339())),
        };

        self.rows.write().await.push(record);
        debug!("Stored row {} from {}", id, sender_id);
        Ok(())
    }
}
