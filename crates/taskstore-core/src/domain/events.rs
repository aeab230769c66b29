//! Mutation events - レプリケーションとストレージ書き込みの最小単位
//!
//! ストレージの各操作（Add, Update, OwnerReg, ...）は書き込みを直接行わず、
//! `Event` の列を計算して返します。列は 1 つのバッチとしてアトミックに適用されます。
//!
//! Design note: events are JSON-encoded when they travel through the
//! consensus log, so the wire shape of `Event` is part of the log format.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "set")]
    Set,
    #[serde(rename = "del")]
    Delete,
}

/// One key mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub key: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<u8>>,
}

impl Event {
    pub fn set(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: EventType::Set,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// SET with a nil value (owner membership keys).
    pub fn set_empty(key: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: EventType::Set,
            key: key.into(),
            value: None,
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: EventType::Delete,
            key: key.into(),
            value: None,
        }
    }

    pub fn key_str(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}

/// Encode a batch for the consensus log.
pub fn encode_batch(events: &[Event]) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(events)
}

/// Decode a committed log entry.
pub fn decode_batch(data: &[u8]) -> serde_json::Result<Vec<Event>> {
    serde_json::from_slice(data)
}
