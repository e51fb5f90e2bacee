/// FeedSync - live view of a shared ephemeral chat feed
///
/// Keeps a bounded, deduplicated, ordered feed in sync from three sources: a one-shot
/// history pull, a live broadcast subscription and the client's own optimistic sends.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod history;
pub mod identity;
pub mod live;
pub mod memory_store;
pub mod message;
pub mod outbound;
pub mod persistence;
pub mod session;
pub mod snapshot;
pub mod state;

pub use config::Config;
pub use error::{FeedError, Result};
pub use feed::{Feed, OrderingPolicy};
pub use message::{Message, Origin, SenderProfile};
pub use session::FeedSession;
