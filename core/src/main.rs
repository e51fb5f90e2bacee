/// FeedSync demo client - joins the shared feed and sends stdin lines
use colored::Colorize;
use feedsync_core::broadcast::LocalBroadcast;
use feedsync_core::events::FeedEvent;
use feedsync_core::identity::{self, LocalIdentity};
use feedsync_core::memory_store::MemoryStore;
use feedsync_core::{Config, Feed, FeedSession};
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_feed(feed: &Feed) {
    println!("{}", format!("--- feed ({}/{}) ---", feed.len(), feed.capacity()).as_str().dimmed());
    for msg in feed.messages() {
        let time = chrono::DateTime::from_timestamp_millis(msg.timestamp)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        let name = if msg.is_local() {
            msg.sender_name().green().bold()
        } else {
            msg.sender_name().cyan()
        };
        println!("{} {}: {}", time.as_str().dimmed(), name, msg.text);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    // Parse configuration
    let args: Vec<String> = env::args().collect();
    let config = Config::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let username = config.username.clone().unwrap_or_else(|| "anon".to_string());
    let local = match &config.data_dir {
        Some(dir) => identity::load_or_create(dir, &username)
            .map_err(|e| anyhow::anyhow!("Identity error: {}", e))?,
        None => LocalIdentity::generate(&username),
    };

    let cache = FeedSession::open_cache(&config)
        .map_err(|e| anyhow::anyhow!("Snapshot cache error: {}", e))?;
    let hub = Arc::new(LocalBroadcast::new());
    let store = Arc::new(MemoryStore::new());
    let session = FeedSession::new(config, cache, hub, store.clone(), store);

    info!("Starting FeedSync on {}", session.config().topic);
    info!("   Participant: {} ({})", local.profile.username, local.peer_id);
    print_feed(&session.feed().await);

    if let Err(e) = session.start().await {
        warn!("Live updates unavailable: {}", e);
    }
    session.set_identity(local).await;

    let mut events = session.subscribe_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        session.send(&text).await;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("stdin error: {}", e);
                        break;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(FeedEvent::FeedUpdated { .. }) => print_feed(&session.feed().await),
                    Ok(FeedEvent::Ready) => info!("Live feed ready"),
                    Ok(FeedEvent::Disconnected) => warn!("Live feed disconnected"),
                    Ok(FeedEvent::HistoryLoaded { received, added }) => {
                        info!("History: {} rows, {} new", received, added)
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                        print_feed(&session.feed().await)
                    }
                    Err(_) => break,
                }
            }
            _ = signal::ctrl_c() => {
                info!("Ctrl+C received");
                break;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}
