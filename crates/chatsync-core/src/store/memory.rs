//! In-process stores for tests and demo mode

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{LocalStore, RemoteStore};
use crate::error::{Error, Result};
use crate::models::{LocalMessage, MessageId, RemoteMessage};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Local store backed by a map, with an access counter and an
/// "unavailable" switch for failure tests.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    messages: Mutex<BTreeMap<MessageId, LocalMessage>>,
    accesses: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing messages
    pub fn with_messages(messages: impl IntoIterator<Item = LocalMessage>) -> Self {
        let store = Self::new();
        {
            let mut map = lock(&store.messages);
            for message in messages {
                map.insert(message.id.clone(), message);
            }
        }
        store
    }

    /// Look up one message without counting it as an access
    pub fn get(&self, id: &MessageId) -> Option<LocalMessage> {
        lock(&self.messages).get(id).cloned()
    }

    /// Copy of every stored message, ordered by id
    pub fn snapshot(&self) -> Vec<LocalMessage> {
        lock(&self.messages).values().cloned().collect()
    }

    /// Number of store operations performed so far
    pub fn access_count(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }

    /// Make every subsequent operation fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn touch(&self) -> Result<()> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Database("local store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn read_all(&self) -> Result<Vec<LocalMessage>> {
        self.touch()?;
        let mut messages = self.snapshot();
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(messages)
    }

    async fn read_unsynced(&self) -> Result<Vec<LocalMessage>> {
        self.touch()?;
        Ok(lock(&self.messages)
            .values()
            .filter(|message| !message.is_synced)
            .cloned()
            .collect())
    }

    async fn upsert(&self, message: &LocalMessage) -> Result<()> {
        self.touch()?;
        lock(&self.messages).insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.touch()?;
        lock(&self.messages).clear();
        Ok(())
    }

    async fn mark_synced(&self, id: &MessageId) -> Result<()> {
        self.touch()?;
        if let Some(message) = lock(&self.messages).get_mut(id) {
            message.is_synced = true;
        }
        Ok(())
    }
}

/// Remote store backed by a map, with request counters and failure injection.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    messages: Mutex<BTreeMap<MessageId, RemoteMessage>>,
    fetches: AtomicUsize,
    sends: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_clear: AtomicBool,
    /// Number of further sends to accept before rejecting; `None` accepts all
    send_budget: Mutex<Option<usize>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing messages
    pub fn with_messages(messages: impl IntoIterator<Item = RemoteMessage>) -> Self {
        let store = Self::new();
        {
            let mut map = lock(&store.messages);
            for message in messages {
                map.insert(message.id.clone(), message);
            }
        }
        store
    }

    /// Copy of every stored message, ordered by id
    pub fn messages(&self) -> Vec<RemoteMessage> {
        lock(&self.messages).values().cloned().collect()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        lock(&self.messages).contains_key(id)
    }

    /// Number of `fetch_all` calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of accepted `send` calls so far
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Make `fetch_all` fail until switched back
    pub fn set_fetch_failure(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make `clear_all` fail until switched back
    pub fn set_clear_failure(&self, fail: bool) {
        self.fail_clear.store(fail, Ordering::SeqCst);
    }

    /// Accept `accepted` more sends, then reject every following one
    pub fn fail_sends_after(&self, accepted: usize) {
        *lock(&self.send_budget) = Some(accepted);
    }

    /// Accept every send again
    pub fn accept_all_sends(&self) {
        *lock(&self.send_budget) = None;
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_all(&self) -> Result<Vec<RemoteMessage>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::Remote("fetch rejected (503)".to_string()));
        }
        Ok(self.messages())
    }

    async fn send(&self, message: &RemoteMessage) -> Result<()> {
        {
            let mut budget = lock(&self.send_budget);
            match budget.as_mut() {
                Some(0) => {
                    return Err(Error::Remote(format!(
                        "send rejected for message {} (503)",
                        message.id
                    )));
                }
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }

        self.sends.fetch_add(1, Ordering::SeqCst);
        lock(&self.messages).insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(Error::Remote("clear rejected (503)".to_string()));
        }
        lock(&self.messages).clear();
        Ok(())
    }
}
