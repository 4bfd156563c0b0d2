//! Shared cross-platform state types.

use crate::models::SyncStatus;

/// Coarse sync state published to application shells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    #[default]
    Idle,
    Syncing,
    Synced,
    Error,
}

impl SyncState {
    /// State implied by the terminal status of a pass, if any.
    pub const fn after(status: &SyncStatus) -> Option<Self> {
        match status {
            SyncStatus::Success => Some(Self::Synced),
            SyncStatus::Error(_) => Some(Self::Error),
            SyncStatus::Started | SyncStatus::InProgress(_) => None,
        }
    }
}
