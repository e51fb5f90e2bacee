/// Events streamed to the presentation layer
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// The feed changed; `added` messages were inserted by the last merge
    FeedUpdated { len: usize, added: usize },
    /// The live subscription is active
    Ready,
    /// The live subscription ended; the feed stays usable
    Disconnected,
    /// The one-shot history pull finished (`received` includes rows dropped or deduplicated)
    HistoryLoaded { received: usize, added: usize },
}
