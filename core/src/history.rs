/// History reconciler: maps rows from durable storage into feed messages
use crate::error::Result;
use crate::message::{Message, MessageKind, Origin, SenderProfile};
use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Row shape returned by the historical fetch. Every field is optional because rows come from
/// an external store; incomplete rows are dropped during reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Numeric or string id
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_profile: Option<SenderProfile>,
    /// RFC 3339 string or integer milliseconds
    #[serde(default)]
    pub created_at: Option<Value>,
}

/// Durable storage read side. Returns records newest first.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self) -> Result<Vec<HistoryRecord>>;
}

fn id_string(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

impl HistoryRecord {
    /// Map this row to a message, tagging origin against the local participant id.
    /// Returns `None` for rows missing a required field.
    pub fn to_message(&self, local_id: &str) -> Option<Message> {
        let id = self.id.as_ref().and_then(id_string)?;
        let text = self.content.clone()?;
        let sender_id = self.sender_id.clone().filter(|s| !s.trim().is_empty())?;
        let timestamp = self.created_at.as_ref().and_then(timestamp_millis)?;

        let sender_display = match (&self.sender_profile, &self.sender_name) {
            (Some(profile), _) => profile.clone(),
            (None, Some(name)) => SenderProfile::new(name.clone()),
            (None, None) => SenderProfile::new(sender_id.clone()),
        };

        let origin = if sender_id == local_id {
            Origin::Local
        } else {
            Origin::Peer
        };

        Some(Message {
            id,
            text,
            origin,
            sender_id,
            sender_display,
            timestamp,
            kind: MessageKind::Text,
        })
    }
}

/// Reshape historical rows into messages. Ordering is left to the feed merge.
pub fn reconcile(records: &[HistoryRecord], local_id: &str) -> Vec<Message> {
    let messages: Vec<Message> = records
        .iter()
        .filter_map(|r| r.to_message(local_id))
        .collect();

    let dropped = records.len() - messages.len();
    if dropped > 0 {
        debug!("Dropped {} malformed history records", dropped);
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> HistoryRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_maps_rows_and_tags_origin() {
        let rows = vec![
            record(json!({
                "id": 42,
                "content": "newer",
                "sender_id": "me",
                "sender_name": "Me",
                "created_at": "2024-05-01T12:00:01+00:00"
            })),
            record(json!({
                "id": "41",
                "content": "older",
                "sender_id": "them",
                "sender_profile": {"username": "Them", "bio": "hi"},
                "created_at": 1714564800000i64
            })),
        ];

        let msgs = reconcile(&rows, "me");
        assert_eq!(msgs.len(), 2);

        assert_eq!(msgs[0].id, "42");
        assert_eq!(msgs[0].origin, Origin::Local);
        assert_eq!(msgs[0].sender_name(), "Me");
        assert_eq!(msgs[0].timestamp, 1714564801000);

        assert_eq!(msgs[1].id, "41");
        assert_eq!(msgs[1].origin, Origin::Peer);
        assert_eq!(msgs[1].sender_display.bio.as_deref(), Some("hi"));
    }

    #[test]
    fn test_drops_malformed_rows() {
        let rows = vec![
            record(json!({"content": "no id", "sender_id": "a", "created_at": 1})),
            record(json!({"id": 1, "sender_id": "a", "created_at": 1})),
            record(json!({"id": 2, "content": "x", "created_at": 1})),
            record(json!({"id": 3, "content": "x", "sender_id": "a", "created_at": "yesterday"})),
            record(json!({"id": true, "content": "x", "sender_id": "a", "created_at": 1})),
            record(json!({"id": 4, "content": "ok", "sender_id": "a", "created_at": 5})),
        ];

        let msgs = reconcile(&rows, "me");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id, "4");
        assert_eq!(msgs[0].sender_name(), "a");
    }

    #[test]
    fn test_empty_history_maps_to_nothing() {
        assert!(reconcile(&[], "me").is_empty());
    }
}
