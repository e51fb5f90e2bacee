/// Message types shared by every producer of the feed
use serde::{Deserialize, Serialize};

/// Whether a message was authored on this client instance or received from another participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Authored locally through the outbound sender
    #[serde(rename = "self")]
    Local,
    /// Received from another participant
    Peer,
}

/// Message content kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
}

/// Profile snapshot of a sender, captured at send time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl SenderProfile {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            avatar_url: None,
            bio: None,
        }
    }
}

/// One entry of the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub origin: Origin,
    pub sender_id: String,
    pub sender_display: SenderProfile,
    /// Send time in milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default)]
    pub kind: MessageKind,
}

impl Message {
    pub fn sender_name(&self) -> &str {
        &self.sender_display.username
    }

    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }

    /// Payload published on the broadcast channel for this message
    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            id: self.id.clone(),
            text: self.text.clone(),
            sender_id: self.sender_id.clone(),
            sender_profile: self.sender_display.clone(),
            timestamp: self.timestamp,
            kind: self.kind,
        }
    }
}

/// Broadcast payload. Carries no origin: the receiving side decides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    pub sender_profile: SenderProfile,
    pub timestamp: i64,
    #[serde(default)]
    pub kind: MessageKind,
}

impl WireMessage {
    /// Decode a delivery, rejecting payloads without an id or sender
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let wire: WireMessage = serde_json::from_slice(bytes).ok()?;
        if wire.id.trim().is_empty() || wire.sender_id.trim().is_empty() {
            return None;
        }
        Some(wire)
    }

    pub fn into_message(self, origin: Origin) -> Message {
        Message {
            id: self.id,
            text: self.text,
            origin,
            sender_id: self.sender_id,
            sender_display: self.sender_profile,
            timestamp: self.timestamp,
            kind: self.kind,
        }
    }
}
