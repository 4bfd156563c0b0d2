use std::fs::File;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatsync_core::chat::ChatRepository;
use chatsync_core::db::LibSqlLocalStore;
use chatsync_core::store::HttpRemoteStore;
use chatsync_core::{LocalMessage, SyncSettings, SyncStatus};
use chrono::Utc;
use fs2::FileExt;
use serde::Serialize;

use crate::error::CliError;

/// Settings and database location resolved from flags, file and environment
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: SyncSettings,
    pub db_path: PathBuf,
}

impl Context {
    /// Resolve settings: file (or defaults), environment, then CLI flags.
    pub fn resolve(
        config_path: Option<PathBuf>,
        db_path: Option<PathBuf>,
        remote_url: Option<String>,
    ) -> Result<Self, CliError> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        let mut settings = SyncSettings::load_from_path(&config_path)?;

        if let Some(url) = remote_url.and_then(|url| normalize_content(&url)) {
            settings.remote_base_url = url;
            settings.validate()?;
        }

        let db_path = match db_path.or_else(|| settings.db_path.clone()) {
            Some(path) => path,
            None => default_db_path()?,
        };

        Ok(Self { settings, db_path })
    }

    pub async fn open_local(&self) -> Result<LibSqlLocalStore, CliError> {
        Ok(LibSqlLocalStore::open(&self.db_path).await?)
    }

    pub fn open_remote(&self) -> Result<HttpRemoteStore, CliError> {
        Ok(HttpRemoteStore::new(
            self.settings.remote_base_url.clone(),
            self.settings.request_timeout(),
        )?)
    }

    pub async fn chat_repository(&self) -> Result<ChatRepository, CliError> {
        let local = self.open_local().await?;
        let remote = self.open_remote()?;
        Ok(ChatRepository::new(Arc::new(local), Arc::new(remote)))
    }
}

/// Exclusive lock over sync passes against one database file.
///
/// Held by the daemon for its lifetime and by a one-shot sync for one pass.
/// The operating system releases it when the holder exits.
#[derive(Debug)]
pub struct SyncLock {
    _file: File,
}

impl SyncLock {
    pub fn acquire(db_path: &Path) -> Result<Self, CliError> {
        let lock_path = sync_lock_path(db_path);
        ensure_parent_dir(&lock_path)?;
        let file = File::create(&lock_path)?;

        file.try_lock_exclusive().map_err(|error| {
            CliError::SyncBusy(format!(
                "another chatsync process is syncing {} ({error})",
                db_path.display()
            ))
        })?;
        tracing::debug!("Acquired sync lock {}", lock_path.display());
        Ok(Self { _file: file })
    }
}

pub fn sync_lock_path(db_path: &Path) -> PathBuf {
    db_path.with_extension("sync.lock")
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("chatsync").join("settings.json"))
        .ok_or_else(|| CliError::Config("failed to resolve config directory".to_string()))
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("chatsync").join("messages.db"))
        .ok_or_else(|| CliError::Config("failed to resolve data directory".to_string()))
}

#[derive(Debug, Serialize)]
pub struct MessageListItem {
    pub id: String,
    pub role: &'static str,
    pub content: String,
    pub timestamp: i64,
    pub synced: bool,
}

pub fn message_to_list_item(message: &LocalMessage) -> MessageListItem {
    MessageListItem {
        id: message.id.to_string(),
        role: role(message),
        content: message.content.clone(),
        timestamp: message.timestamp,
        synced: message.is_synced,
    }
}

const fn role(message: &LocalMessage) -> &'static str {
    if message.is_from_user {
        "user"
    } else {
        "assistant"
    }
}

pub fn format_message_lines(messages: &[LocalMessage]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    messages
        .iter()
        .map(|message| {
            let id = message.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let marker = if message.is_synced { ' ' } else { '*' };
            let preview = message_preview(&message.content, 48);
            let relative_time = format_relative_time(message.timestamp, now_ms);
            format!(
                "{short_id:<13}{marker} {:<9}  {preview:<48}  {relative_time}",
                role(message)
            )
        })
        .collect()
}

pub fn message_preview(content: &str, max_chars: usize) -> String {
    let first_line = content.lines().next().unwrap_or_default();
    if first_line.chars().count() > max_chars {
        let truncated = first_line
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        format!("{truncated}...")
    } else {
        first_line.to_string()
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
            || timestamp_ms.to_string(),
            |date_time| date_time.format("%Y-%m-%d").to_string(),
        )
    }
}

/// Human readable line for one pass status
pub fn format_status(status: &SyncStatus) -> String {
    match status {
        SyncStatus::Started => "Sync started".to_string(),
        SyncStatus::InProgress(percent) => {
            let step = match percent {
                0..=19 => "reading local changes",
                20..=39 => "fetching remote messages",
                40..=59 => "resolving conflicts",
                60..=79 => "applying remote changes",
                _ => "sending local changes",
            };
            format!("[{percent:>3}%] {step}")
        }
        SyncStatus::Success => "Sync completed".to_string(),
        SyncStatus::Error(detail) => format!("Sync failed: {detail}"),
    }
}

pub fn resolve_message_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn ensure_parent_dir(path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
