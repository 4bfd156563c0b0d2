//! Data models for chatsync

mod message;
mod sync;

pub use message::{ChatMessage, LocalMessage, MessageId, RemoteMessage};
pub use sync::{SyncPatch, SyncStatus};
