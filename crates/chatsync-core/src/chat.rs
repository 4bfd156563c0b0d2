//! Chat history on top of the local and remote stores.
//!
//! Writes always land locally first. Sending to the remote store right away is
//! best effort; anything that fails stays unsynced and is picked up by the
//! next sync pass.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{ChatMessage, LocalMessage};
use crate::store::{LocalStore, RemoteStore};

/// Opaque text generation backend
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct ChatRepository {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
}

impl ChatRepository {
    pub fn new(local: Arc<dyn LocalStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { local, remote }
    }

    /// Store a user-authored message. Returns it as stored.
    pub async fn save_user_message(&self, content: &str) -> Result<LocalMessage> {
        self.save(LocalMessage::user(content)).await
    }

    /// Store a generated reply. Returns it as stored.
    pub async fn save_ai_response(&self, content: &str) -> Result<LocalMessage> {
        self.save(LocalMessage::generated(content)).await
    }

    async fn save(&self, mut message: LocalMessage) -> Result<LocalMessage> {
        self.local.upsert(&message).await?;

        match self.remote.send(&message.to_remote()).await {
            Ok(()) => {
                self.local.mark_synced(&message.id).await?;
                message.is_synced = true;
            }
            Err(error) => {
                tracing::warn!("Message {} kept for later sync: {error}", message.id);
            }
        }
        Ok(message)
    }

    /// Local history, newest first
    pub async fn history(&self) -> Result<Vec<ChatMessage>> {
        Ok(self
            .local
            .read_all()
            .await?
            .into_iter()
            .map(ChatMessage::from)
            .collect())
    }

    /// Delete local history, then try to clear the remote store as well
    pub async fn clear_history(&self) -> Result<()> {
        self.local.delete_all().await?;

        if let Err(error) = self.remote.clear_all().await {
            tracing::warn!("Remote history not cleared: {error}");
        }
        Ok(())
    }
}

/// One conversation: record the prompt, generate a reply, record the reply
pub struct ChatSession {
    repository: ChatRepository,
    generator: Arc<dyn ResponseGenerator>,
}

impl ChatSession {
    pub fn new(repository: ChatRepository, generator: Arc<dyn ResponseGenerator>) -> Self {
        Self {
            repository,
            generator,
        }
    }

    pub const fn repository(&self) -> &ChatRepository {
        &self.repository
    }

    /// Returns the generated reply
    pub async fn process_message(&self, text: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("message must not be empty".to_string()));
        }

        self.repository.save_user_message(text).await?;
        let reply = self.generator.generate(text).await?;
        self.repository.save_ai_response(&reply).await?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryLocalStore, MemoryRemoteStore};
    use pretty_assertions::assert_eq;

    fn stores() -> (Arc<MemoryLocalStore>, Arc<MemoryRemoteStore>, ChatRepository) {
        let local = Arc::new(MemoryLocalStore::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        let repository = ChatRepository::new(local.clone(), remote.clone());
        (local, remote, repository)
    }

    struct Echo;

    #[async_trait]
    impl ResponseGenerator for Echo {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("You said: {prompt}"))
        }
    }

    struct Broken;

    #[async_trait]
    impl ResponseGenerator for Broken {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(Error::InvalidInput("model not loaded".to_string()))
        }
    }

    #[tokio::test]
    async fn test_saved_message_is_sent_and_marked_synced() {
        let (local, remote, repository) = stores();

        let saved = repository.save_user_message("hello").await.unwrap();

        assert!(saved.is_synced);
        assert!(saved.is_from_user);
        assert!(local.get(&saved.id).unwrap().is_synced);
        assert!(remote.contains(&saved.id));
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_message_unsynced() {
        let (local, remote, repository) = stores();
        remote.fail_sends_after(0);

        let saved = repository.save_ai_response("reply").await.unwrap();

        assert!(!saved.is_synced);
        assert!(!saved.is_from_user);
        assert_eq!(local.get(&saved.id).unwrap(), saved);
        assert!(!remote.contains(&saved.id));
    }

    #[tokio::test]
    async fn test_local_failure_is_an_error() {
        let (local, remote, repository) = stores();
        local.set_unavailable(true);

        assert!(repository.save_user_message("hello").await.is_err());
        assert_eq!(remote.send_count(), 0);
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let local = Arc::new(MemoryLocalStore::with_messages([
            LocalMessage {
                id: "old".into(),
                content: "first".to_string(),
                is_from_user: true,
                timestamp: 1000,
                is_synced: true,
            },
            LocalMessage {
                id: "new".into(),
                content: "second".to_string(),
                is_from_user: false,
                timestamp: 2000,
                is_synced: false,
            },
        ]));
        let repository = ChatRepository::new(local, Arc::new(MemoryRemoteStore::new()));

        let history = repository.history().await.unwrap();

        let ids: Vec<_> = history.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_clear_history_tolerates_remote_failure() {
        let (local, remote, repository) = stores();
        repository.save_user_message("hello").await.unwrap();
        remote.set_clear_failure(true);

        repository.clear_history().await.unwrap();

        assert!(local.snapshot().is_empty());
        assert_eq!(remote.messages().len(), 1);

        remote.set_clear_failure(false);
        repository.clear_history().await.unwrap();
        assert!(remote.messages().is_empty());
    }

    #[tokio::test]
    async fn test_process_message_records_both_sides() {
        let (_local, _remote, repository) = stores();
        let session = ChatSession::new(repository, Arc::new(Echo));

        let reply = session.process_message("  ping ").await.unwrap();

        assert_eq!(reply, "You said: ping");
        let history = session.repository().history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|m| m.is_from_user && m.content == "ping"));
        assert!(history.iter().any(|m| !m.is_from_user && m.content == reply));
    }

    #[tokio::test]
    async fn test_process_message_rejects_blank_input() {
        let (local, _remote, repository) = stores();
        let session = ChatSession::new(repository, Arc::new(Echo));

        let error = session.process_message("   ").await.unwrap_err();

        assert!(matches!(error, Error::InvalidInput(_)));
        assert_eq!(local.access_count(), 0);
    }

    #[tokio::test]
    async fn test_generator_failure_keeps_user_message() {
        let (local, _remote, repository) = stores();
        let session = ChatSession::new(repository, Arc::new(Broken));

        assert!(session.process_message("hello").await.is_err());

        let stored = local.snapshot();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_from_user);
    }
}
