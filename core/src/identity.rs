/// Local participant identity, persisted next to the snapshot cache
use crate::error::{FeedError, Result};
use crate::message::SenderProfile;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

const IDENTITY_FILE: &str = "identity.json";

/// Who this client is on the shared feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub peer_id: String,
    pub profile: SenderProfile,
}

impl LocalIdentity {
    pub fn new(peer_id: impl Into<String>, profile: SenderProfile) -> Self {
        Self {
            peer_id: peer_id.into(),
            profile,
        }
    }

    /// Fresh identity with a random UUID v4 peer id
    pub fn generate(username: &str) -> Self {
        Self::new(Uuid::new_v4().to_string(), SenderProfile::new(username))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityFileV1 {
    version: u8,
    peer_id: String,
    profile: SenderProfile,
}

fn identity_path(data_dir: &Path) -> PathBuf {
    data_dir.join(IDENTITY_FILE)
}

/// Load the identity from `data_dir`, creating and saving one on first use.
/// `username` is only used when a new identity is created.
pub fn load_or_create(data_dir: &Path, username: &str) -> Result<LocalIdentity> {
    fs::create_dir_all(data_dir).map_err(FeedError::Io)?;

    let path = identity_path(data_dir);
    if path.exists() {
        let raw = fs::read_to_string(&path).map_err(FeedError::Io)?;
        let parsed: IdentityFileV1 =
            serde_json::from_str(&raw).map_err(FeedError::Serialization)?;
        if parsed.version != 1 {
            return Err(FeedError::Identity(format!(
                "Unsupported identity file version: {}",
                parsed.version
            )));
        }
        if parsed.peer_id.trim().is_empty() {
            return Err(FeedError::Identity("identity file has an empty peer id".to_string()));
        }
        return Ok(LocalIdentity::new(parsed.peer_id, parsed.profile));
    }

    let identity = LocalIdentity::generate(username);
    let file = IdentityFileV1 {
        version: 1,
        peer_id: identity.peer_id.clone(),
        profile: identity.profile.clone(),
    };
    let json = serde_json::to_string_pretty(&file).map_err(FeedError::Serialization)?;
    fs::write(&path, json).map_err(FeedError::Io)?;

    info!("Created identity {} at {:?}", identity.peer_id, path);
    Ok(identity)
}
