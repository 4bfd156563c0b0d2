//! libSQL-backed local message store

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::params;
use tokio::sync::Mutex;

use super::Database;
use crate::error::Result;
use crate::models::{LocalMessage, MessageId};
use crate::store::LocalStore;

const SELECT_COLUMNS: &str = "SELECT id, content, is_from_user, timestamp, is_synced FROM chat_messages";

/// Thread-safe local store over a single libSQL connection.
#[derive(Clone)]
pub struct LibSqlLocalStore {
    db: Arc<Mutex<Database>>,
}

impl LibSqlLocalStore {
    /// Open (or create) the message database at the given path
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::new(Database::open(path).await?))
    }

    /// Open an in-memory store (primarily for tests)
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    async fn query_messages(&self, sql: &str) -> Result<Vec<LocalMessage>> {
        let db = self.db.lock().await;
        let mut rows = db.connection().query(sql, ()).await?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next().await? {
            messages.push(parse_message(&row)?);
        }
        Ok(messages)
    }
}

/// Parse a message from a database row
fn parse_message(row: &libsql::Row) -> Result<LocalMessage> {
    Ok(LocalMessage {
        id: MessageId::from(row.get::<String>(0)?),
        content: row.get(1)?,
        is_from_user: row.get::<i32>(2)? != 0,
        timestamp: row.get(3)?,
        is_synced: row.get::<i32>(4)? != 0,
    })
}

#[async_trait]
impl LocalStore for LibSqlLocalStore {
    async fn read_all(&self) -> Result<Vec<LocalMessage>> {
        self.query_messages(&format!("{SELECT_COLUMNS} ORDER BY timestamp DESC, id DESC"))
            .await
    }

    async fn read_unsynced(&self) -> Result<Vec<LocalMessage>> {
        self.query_messages(&format!(
            "{SELECT_COLUMNS} WHERE is_synced = 0 ORDER BY timestamp ASC, id ASC"
        ))
        .await
    }

    async fn upsert(&self, message: &LocalMessage) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT OR REPLACE INTO chat_messages (id, content, is_from_user, timestamp, is_synced)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    message.id.as_str(),
                    message.content.as_str(),
                    i32::from(message.is_from_user),
                    message.timestamp,
                    i32::from(message.is_synced)
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute("DELETE FROM chat_messages", ())
            .await?;
        Ok(())
    }

    async fn mark_synced(&self, id: &MessageId) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "UPDATE chat_messages SET is_synced = 1 WHERE id = ?",
                [id.as_str()],
            )
            .await?;
        Ok(())
    }
}
