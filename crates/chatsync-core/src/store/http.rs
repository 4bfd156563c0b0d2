//! JSON-over-HTTP remote message store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::RemoteStore;
use crate::error::{Error, Result};
use crate::models::RemoteMessage;
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Remote store speaking to `{base_url}/messages`.
#[derive(Clone)]
pub struct HttpRemoteStore {
    messages_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("messages_url", &self.messages_url)
            .finish_non_exhaustive()
    }
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            messages_url: format!("{base_url}/messages"),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_all(&self) -> Result<Vec<RemoteMessage>> {
        let response = self
            .client
            .get(&self.messages_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = ensure_success(response).await?;
        Ok(response.json::<Vec<RemoteMessage>>().await?)
    }

    async fn send(&self, message: &RemoteMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.messages_url)
            .json(message)
            .send()
            .await?;

        ensure_success(response).await?;
        tracing::debug!("Sent message {} to remote store", message.id);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let response = self.client.delete(&self.messages_url).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Remote(parse_remote_error(status, &body)))
}

fn parse_remote_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<RemoteErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("remote base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "remote base URL must include http:// or https://".to_string(),
        ))
    }
}
