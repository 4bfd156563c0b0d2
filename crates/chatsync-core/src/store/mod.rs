//! Record store contracts consumed by the sync engine
//!
//! The sync engine only relies on the operations below; persistence and
//! transport mechanics belong to the implementations.

mod http;
mod memory;

pub use http::HttpRemoteStore;
pub use memory::{MemoryLocalStore, MemoryRemoteStore};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{LocalMessage, MessageId, RemoteMessage};

/// On-device message store. Every operation is idempotent.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// All messages, newest first
    async fn read_all(&self) -> Result<Vec<LocalMessage>>;

    /// Messages whose synced flag is still false
    async fn read_unsynced(&self) -> Result<Vec<LocalMessage>>;

    /// Insert or replace a message by identifier
    async fn upsert(&self, message: &LocalMessage) -> Result<()>;

    /// Remove every message
    async fn delete_all(&self) -> Result<()>;

    /// Set the synced flag for one message. Unknown ids are ignored.
    async fn mark_synced(&self, id: &MessageId) -> Result<()>;
}

/// Server-side message store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Full remote record set
    async fn fetch_all(&self) -> Result<Vec<RemoteMessage>>;

    /// Store one record; an `Err` means the remote did not accept it
    async fn send(&self, message: &RemoteMessage) -> Result<()>;

    /// Remove every remote record
    async fn clear_all(&self) -> Result<()>;
}
