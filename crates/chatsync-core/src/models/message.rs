//! Chat message models

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::util::unix_millis_now;

/// Stable, globally unique message identifier.
///
/// The identifier is the only join key between local and remote records.
/// Freshly created ids are UUID v7 (time-sortable), but any non-empty string
/// received from the remote store is accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new unique message ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A message as stored on this device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMessage {
    /// Unique identifier
    pub id: MessageId,
    /// Plain text content
    pub content: String,
    /// `true` for user-authored messages, `false` for generated replies
    pub is_from_user: bool,
    /// Creation timestamp (Unix ms)
    pub timestamp: i64,
    /// Set once the remote store holds an equivalent record
    pub is_synced: bool,
}

impl LocalMessage {
    /// Create an unsynced user-authored message stamped with the current time
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::fresh(content, true)
    }

    /// Create an unsynced generated message stamped with the current time
    #[must_use]
    pub fn generated(content: impl Into<String>) -> Self {
        Self::fresh(content, false)
    }

    fn fresh(content: impl Into<String>, is_from_user: bool) -> Self {
        Self {
            id: MessageId::new(),
            content: content.into(),
            is_from_user,
            timestamp: unix_millis_now(),
            is_synced: false,
        }
    }

    /// Local copy of a remote record. Pulled records are synced by definition.
    #[must_use]
    pub fn from_remote(remote: RemoteMessage) -> Self {
        Self {
            id: remote.id,
            content: remote.content,
            is_from_user: remote.is_from_user,
            timestamp: remote.timestamp,
            is_synced: true,
        }
    }

    /// Wire representation for the remote store
    #[must_use]
    pub fn to_remote(&self) -> RemoteMessage {
        RemoteMessage {
            id: self.id.clone(),
            content: self.content.clone(),
            is_from_user: self.is_from_user,
            timestamp: self.timestamp,
        }
    }
}

/// A message as held by the remote store. The remote has no notion of
/// pending work, so there is no synced flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    pub id: MessageId,
    pub content: String,
    pub is_from_user: bool,
    pub timestamp: i64,
}

/// Message as shown in chat history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub content: String,
    pub is_from_user: bool,
    pub timestamp: i64,
}

impl From<LocalMessage> for ChatMessage {
    fn from(message: LocalMessage) -> Self {
        Self {
            id: message.id,
            content: message.content,
            is_from_user: message.is_from_user,
            timestamp: message.timestamp,
        }
    }
}
