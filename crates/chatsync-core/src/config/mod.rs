//! Runtime settings for the sync subsystem.
//!
//! Settings come from an optional JSON file, then environment overrides, and
//! are validated before use. Every field has a default, so an empty object (or
//! a missing file) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::RetryPolicy;
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_REMOTE_URL: &str = "CHATSYNC_REMOTE_URL";
pub const ENV_DB_PATH: &str = "CHATSYNC_DB_PATH";
pub const ENV_SYNC_INTERVAL_SECS: &str = "CHATSYNC_SYNC_INTERVAL_SECS";

const DEFAULT_REMOTE_BASE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Local message database. `None` lets the application pick a platform path.
    pub db_path: Option<PathBuf>,
    pub remote_base_url: String,
    pub request_timeout_secs: u64,
    /// Period of the background sync job
    pub sync_interval_secs: u64,
    pub retry: RetrySettings,
    pub probe: ProbeSettings,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            db_path: None,
            remote_base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            request_timeout_secs: 10,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            retry: RetrySettings::default(),
            probe: ProbeSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub max_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_backoff_secs: 30,
            max_backoff_secs: 15 * 60,
            max_attempts: 5,
        }
    }
}

/// TCP reachability probe used as the connectivity source outside of an
/// embedding application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeSettings {
    /// `host:port` to connect to
    pub address: String,
    pub interval_secs: u64,
    pub timeout_millis: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            address: "1.1.1.1:53".to_string(),
            interval_secs: 30,
            timeout_millis: 3000,
        }
    }
}

impl SyncSettings {
    /// Parse settings from a JSON payload without validating them
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid settings: {error}")))
    }

    /// Load settings from `path`, falling back to defaults when it does not
    /// exist, then apply environment overrides and validate.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut settings = match std::fs::read_to_string(path) {
            Ok(payload) => Self::from_json(&payload)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings file at {}, using defaults", path.display());
                Self::default()
            }
            Err(error) => return Err(error.into()),
        };

        settings.apply_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    ///
    /// Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = normalize_text_option(lookup(ENV_REMOTE_URL)) {
            self.remote_base_url = url;
        }
        if let Some(path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_SYNC_INTERVAL_SECS)) {
            self.sync_interval_secs = raw.parse().map_err(|_| {
                Error::Config(format!(
                    "{ENV_SYNC_INTERVAL_SECS} must be a whole number of seconds, got '{raw}'"
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(self.remote_base_url.trim()) {
            return Err(Error::Config(
                "remote_base_url must include http:// or https://".to_string(),
            ));
        }

        let non_zero = [
            ("request_timeout_secs", self.request_timeout_secs),
            ("sync_interval_secs", self.sync_interval_secs),
            ("retry.initial_backoff_secs", self.retry.initial_backoff_secs),
            ("retry.max_backoff_secs", self.retry.max_backoff_secs),
            ("retry.max_attempts", u64::from(self.retry.max_attempts)),
            ("probe.interval_secs", self.probe.interval_secs),
            ("probe.timeout_millis", self.probe.timeout_millis),
        ];
        if let Some((field, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Config(format!("{field} must be greater than zero")));
        }

        if self.retry.max_backoff_secs < self.retry.initial_backoff_secs {
            return Err(Error::Config(
                "retry.max_backoff_secs must not be less than retry.initial_backoff_secs".to_string(),
            ));
        }
        if self.probe.address.trim().is_empty() {
            return Err(Error::Config("probe.address is required".to_string()));
        }
        Ok(())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_secs(self.retry.initial_backoff_secs),
            max_backoff: Duration::from_secs(self.retry.max_backoff_secs),
            max_attempts: self.retry.max_attempts,
        }
    }

    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe.interval_secs)
    }

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe.timeout_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid_and_sync_hourly() {
        let settings = SyncSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.sync_interval(), Duration::from_secs(3600));
        assert_eq!(settings.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn empty_object_yields_defaults() {
        assert_eq!(SyncSettings::from_json("{}").unwrap(), SyncSettings::default());
    }

    #[test]
    fn partial_payload_keeps_other_defaults() {
        let settings = SyncSettings::from_json(
            r#"{
              "remote_base_url": "https://chat.example.com/api",
              "retry": { "max_attempts": 2 }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.remote_base_url, "https://chat.example.com/api");
        assert_eq!(settings.retry.max_attempts, 2);
        assert_eq!(settings.retry.initial_backoff_secs, 30);
        assert_eq!(settings.probe, ProbeSettings::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = SyncSettings::from_json(r#"{ "sync_every": 5 }"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));

        let error = SyncSettings::from_json(r#"{ "probe": { "host": "x" } }"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut settings = SyncSettings::default();
        settings
            .apply_overrides(lookup(&[
                (ENV_REMOTE_URL, "https://sync.example.com"),
                (ENV_DB_PATH, "/tmp/chat.db"),
                (ENV_SYNC_INTERVAL_SECS, "900"),
            ]))
            .unwrap();

        assert_eq!(settings.remote_base_url, "https://sync.example.com");
        assert_eq!(settings.db_path, Some(PathBuf::from("/tmp/chat.db")));
        assert_eq!(settings.sync_interval_secs, 900);
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut settings = SyncSettings::default();
        settings
            .apply_overrides(lookup(&[(ENV_REMOTE_URL, "   "), (ENV_DB_PATH, "")]))
            .unwrap();
        assert_eq!(settings, SyncSettings::default());
    }

    #[test]
    fn invalid_interval_override_is_config_error() {
        let mut settings = SyncSettings::default();
        let error = settings
            .apply_overrides(lookup(&[(ENV_SYNC_INTERVAL_SECS, "hourly")]))
            .unwrap_err();
        assert!(
            matches!(error, Error::Config(message) if message.contains(ENV_SYNC_INTERVAL_SECS))
        );
    }

    #[test]
    fn validate_rejects_bad_values() {
        let settings = SyncSettings {
            remote_base_url: "ftp://example.com".to_string(),
            ..SyncSettings::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Config(_))));

        let settings = SyncSettings {
            sync_interval_secs: 0,
            ..SyncSettings::default()
        };
        let error = settings.validate().unwrap_err();
        assert!(error.to_string().contains("sync_interval_secs"));

        let settings = SyncSettings {
            retry: RetrySettings {
                initial_backoff_secs: 600,
                max_backoff_secs: 60,
                max_attempts: 3,
            },
            ..SyncSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn load_from_missing_path_uses_defaults() {
        let tmp = tempdir().unwrap();
        let settings = SyncSettings::load_from_path(tmp.path().join("absent.json")).unwrap();
        assert_eq!(settings.request_timeout_secs, 10);
    }

    #[test]
    fn load_from_path_reads_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{ "request_timeout_secs": 3, "probe": { "interval_secs": 5 } }"#)
            .unwrap();

        let settings = SyncSettings::load_from_path(&path).unwrap();
        assert_eq!(settings.request_timeout(), Duration::from_secs(3));
        assert_eq!(settings.probe_interval(), Duration::from_secs(5));
    }

    #[test]
    fn load_from_path_rejects_malformed_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let error = SyncSettings::load_from_path(&path).unwrap_err();
        assert!(matches!(error, Error::Config(_)));
    }
}
