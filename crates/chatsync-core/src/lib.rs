//! chatsync-core - offline-first chat message sync
//!
//! This crate keeps a local message store and a remote message store
//! eventually consistent under intermittent connectivity. It contains the
//! models, store implementations, the sync subsystem and the chat repository
//! used by the `chatsync` CLI.

pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use config::SyncSettings;
pub use error::{Error, Result};
pub use models::{ChatMessage, LocalMessage, MessageId, RemoteMessage, SyncPatch, SyncStatus};
pub use state::SyncState;
