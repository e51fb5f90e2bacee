/// Configuration management
use crate::error::{FeedError, Result};
use crate::feed::OrderingPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_TOPIC: &str = "global-meet-v3";
pub const DEFAULT_CACHE_KEY: &str = "global_meet_messages";

/// Feed session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of messages kept in the feed
    pub capacity: usize,

    /// Ordering policy, fixed for the lifetime of a feed
    pub ordering: OrderingPolicy,

    /// Broadcast topic the live feed is exchanged on
    pub topic: String,

    /// Key under which the snapshot cache stores the feed
    pub cache_key: String,

    /// Data directory for the snapshot cache and identity (temporary tree when unset)
    pub data_dir: Option<PathBuf>,

    /// Display name used when a new identity has to be created
    pub username: Option<String>,

    /// Buffer size of the presentation event channel
    pub event_buffer: usize,

    /// Upper bound on the one-shot history fetch
    pub history_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ordering: OrderingPolicy::Chronological,
            topic: DEFAULT_TOPIC.to_string(),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            data_dir: None,
            username: None,
            event_buffer: 256,
            history_timeout: Duration::from_secs(10),
        }
    }
}

fn parse_capacity(raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(0) => Err(FeedError::Config("capacity must be at least 1".to_string())),
        Ok(n) => Ok(n),
        Err(_) => Err(FeedError::Config(format!(
            "capacity must be a positive number, got {:?}",
            raw
        ))),
    }
}

impl Config {
    /// Create config from command line arguments (`args[0]` is the program name)
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = Self::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--newest-first" => {
                    config.ordering = OrderingPolicy::NewestFirst;
                    i += 1;
                }
                "--capacity" => {
                    let raw = args.get(i + 1).ok_or_else(|| {
                        FeedError::Config("--capacity requires a number".to_string())
                    })?;
                    config.capacity = parse_capacity(raw)?;
                    i += 2;
                }
                "--topic" => {
                    let topic = args.get(i + 1).ok_or_else(|| {
                        FeedError::Config("--topic requires a name".to_string())
                    })?;
                    config.topic = topic.clone();
                    i += 2;
                }
                "--data-dir" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        FeedError::Config("--data-dir requires a path argument".to_string())
                    })?;
                    config.data_dir = Some(PathBuf::from(path));
                    i += 2;
                }
                "--username" => {
                    let name = args.get(i + 1).ok_or_else(|| {
                        FeedError::Config("--username requires a name".to_string())
                    })?;
                    config.username = Some(name.clone());
                    i += 2;
                }
                other => {
                    return Err(FeedError::Config(format!(
                        "Unknown argument {:?}. Usage: {} [--capacity N] [--newest-first] [--topic NAME] [--data-dir PATH] [--username NAME]",
                        other,
                        args.first().map(String::as_str).unwrap_or("feedsync")
                    )));
                }
            }
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Env overrides (nice for scripts)
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var("FEEDSYNC_CAPACITY") {
            self.capacity = parse_capacity(&raw)?;
        }
        if let Ok(topic) = std::env::var("FEEDSYNC_TOPIC") {
            if !topic.is_empty() {
                self.topic = topic;
            }
        }
        if let Ok(dir) = std::env::var("FEEDSYNC_DATA_DIR") {
            if !dir.is_empty() {
                self.data_dir = Some(PathBuf::from(dir));
            }
        }
        if std::env::var("FEEDSYNC_NEWEST_FIRST").is_ok() {
            self.ordering = OrderingPolicy::NewestFirst;
        }
        Ok(())
    }
}
