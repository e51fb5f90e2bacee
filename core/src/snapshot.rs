/// Local snapshot cache: write-through mirror of the feed in a sled tree,
/// read once at startup so the feed can be shown before any network activity
use crate::error::{FeedError, Result};
use crate::feed::{Feed, OrderingPolicy};
use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

const SNAPSHOT_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotV1 {
    version: u8,
    messages: Vec<Message>,
}

/// Snapshot cache backed by sled embedded database
#[derive(Clone)]
pub struct SnapshotCache {
    db: sled::Db,
    key: String,
}

impl SnapshotCache {
    /// Open the cache in the given data directory
    pub fn open(data_dir: &Path, key: &str) -> Result<Self> {
        let db_path = data_dir.join("snapshot.db");
        debug!("Opening snapshot cache at {:?}", db_path);

        let db = sled::open(&db_path)
            .map_err(|e| FeedError::Storage(format!("Failed to open snapshot cache: {}", e)))?;

        info!("Snapshot cache initialized at {:?}", db_path);
        Ok(Self {
            db,
            key: key.to_string(),
        })
    }

    /// Open a cache that lives only as long as this process
    pub fn temporary(key: &str) -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| FeedError::Storage(format!("Failed to open temporary cache: {}", e)))?;

        Ok(Self {
            db,
            key: key.to_string(),
        })
    }

    /// Raw bytes stored under the feed key, if any
    pub fn get_raw(&self) -> Result<Option<Vec<u8>>> {
        self.db
            .get(self.key.as_bytes())
            .map(|v| v.map(|ivec| ivec.to_vec()))
            .map_err(|e| FeedError::Storage(format!("Failed to read snapshot: {}", e)))
    }

    /// Overwrite the raw bytes stored under the feed key.
    /// Durability is left to sled's background flusher; see [`SnapshotCache::flush`].
    pub fn set_raw(&self, bytes: Vec<u8>) -> Result<()> {
        self.db
            .insert(self.key.as_bytes(), bytes)
            .map_err(|e| FeedError::Storage(format!("Failed to write snapshot: {}", e)))?;
        Ok(())
    }

    /// Block until pending writes are on disk
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| FeedError::Storage(format!("Failed to flush snapshot: {}", e)))?;
        Ok(())
    }

    /// Load the cached feed (best-effort).
    ///
    /// Absent, unreadable or corrupt data yields an empty feed. Cached messages are merged into
    /// a fresh feed so a snapshot written under another policy or capacity is still usable.
    pub fn load(&self, policy: OrderingPolicy, capacity: usize) -> Feed {
        let empty = Feed::new(policy, capacity);

        let raw = match self.get_raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => return empty,
            Err(e) => {
                warn!("Snapshot cache read failed, starting empty: {}", e);
                return empty;
            }
        };

        let snapshot: SnapshotV1 = match serde_json::from_slice(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!("Snapshot cache is corrupt, starting empty: {}", e);
                return empty;
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            warn!("Unsupported snapshot version {}, starting empty", snapshot.version);
            return empty;
        }

        let feed = empty.merge(snapshot.messages);
        debug!("Hydrated {} messages from snapshot cache", feed.len());
        feed
    }

    /// Mirror the feed into the cache
    pub fn save(&self, feed: &Feed) -> Result<()> {
        let snapshot = SnapshotV1 {
            version: SNAPSHOT_VERSION,
            messages: feed.messages().to_vec(),
        };
        let bytes = serde_json::to_vec(&snapshot).map_err(FeedError::Serialization)?;
        self.set_raw(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageKind, Origin, SenderProfile};
    use tempfile::TempDir;

    fn msg(id: &str, timestamp: i64) -> Message {
        Message {
            id: id.to_string(),
            text: "hello".to_string(),
            origin: Origin::Local,
            sender_id: "me".to_string(),
            sender_display: SenderProfile::new("me"),
            timestamp,
            kind: MessageKind::Text,
        }
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let feed = Feed::new(OrderingPolicy::Chronological, 5).merge(vec![msg("1", 10), msg("2", 20)]);

        {
            let cache = SnapshotCache::open(temp_dir.path(), "feed").unwrap();
            cache.save(&feed).unwrap();
            cache.flush().unwrap();
        }

        let cache = SnapshotCache::open(temp_dir.path(), "feed").unwrap();
        let loaded = cache.load(OrderingPolicy::Chronological, 5);
        assert_eq!(loaded, feed);
        assert_eq!(loaded.get("1").unwrap().origin, Origin::Local);
    }

    #[test]
    fn test_missing_and_corrupt_snapshot_load_empty() {
        let cache = SnapshotCache::temporary("feed").unwrap();
        assert!(cache.load(OrderingPolicy::Chronological, 5).is_empty());

        cache.set_raw(b"{not json".to_vec()).unwrap();
        assert!(cache.load(OrderingPolicy::Chronological, 5).is_empty());

        cache
            .set_raw(br#"{"version":9,"messages":[]}"#.to_vec())
            .unwrap();
        assert!(cache.load(OrderingPolicy::Chronological, 5).is_empty());
    }

    #[test]
    fn test_load_applies_current_policy_and_capacity() {
        let cache = SnapshotCache::temporary("feed").unwrap();
        let feed = Feed::new(OrderingPolicy::Chronological, 5)
            .merge(vec![msg("1", 10), msg("2", 20), msg("3", 30)]);
        cache.save(&feed).unwrap();

        let loaded = cache.load(OrderingPolicy::NewestFirst, 2);
        assert_eq!(loaded.ids(), vec!["3", "2"]);
    }
}
