//! Sync pass models

use serde::{Deserialize, Serialize};
use std::fmt;

use super::message::{LocalMessage, RemoteMessage};

/// Bidirectional patch produced by conflict resolution for one pass.
///
/// `pull` records are applied to the local store, `push` records are sent to
/// the remote store. The two lists never share an identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPatch {
    pub pull: Vec<RemoteMessage>,
    pub push: Vec<LocalMessage>,
}

impl SyncPatch {
    /// True when both sides have already converged
    pub fn is_empty(&self) -> bool {
        self.pull.is_empty() && self.push.is_empty()
    }

    /// Total number of records to apply
    pub fn len(&self) -> usize {
        self.pull.len() + self.push.len()
    }
}

/// Progress event emitted during one sync pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SyncStatus {
    Started,
    /// Coarse milestone percentage (0-100)
    InProgress(u8),
    Success,
    Error(String),
}

impl SyncStatus {
    /// `Success` and `Error` end a pass
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error(_))
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => f.write_str("started"),
            Self::InProgress(percent) => write!(f, "in progress ({percent}%)"),
            Self::Success => f.write_str("success"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!SyncStatus::Started.is_terminal());
        assert!(!SyncStatus::InProgress(40).is_terminal());
        assert!(SyncStatus::Success.is_terminal());
        assert!(SyncStatus::Error("boom".to_string()).is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&SyncStatus::InProgress(60)).unwrap();
        assert_eq!(json, r#"{"status":"in_progress","detail":60}"#);

        let json = serde_json::to_string(&SyncStatus::Success).unwrap();
        assert_eq!(json, r#"{"status":"success"}"#);
    }

    #[test]
    fn test_empty_patch() {
        let patch = SyncPatch::default();
        assert!(patch.is_empty());
        assert_eq!(patch.len(), 0);
    }
}
