//! A client for delivering messages through the Telegram Bot API.

use crate::config::TelegramConfig;
use crate::core::Transport;
use crate::errors::TransportError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// The subset of a Bot API reply that matters for delivery.
#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages with `sendMessage`.
pub struct TelegramClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Creates a new `TelegramClient`.
    ///
    /// # Arguments
    /// * `api_url` - Base URL of the Bot API, without a trailing slash.
    /// * `token` - The bot token issued by @BotFather.
    /// * `timeout` - Upper bound for a single request.
    pub fn new(api_url: &str, token: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &TelegramConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.api_url,
            config.bot_token.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.token)
    }
}

#[async_trait]
impl Transport for TelegramClient {
    fn name(&self) -> &str {
        "telegram"
    }

    #[instrument(skip(self, text), fields(len = text.len()))]
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        let payload = json!({ "chat_id": recipient, "text": text });

        let response = self
            .client
            .post(self.send_message_url())
            .json(&payload)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        // Telegram puts the useful error text in the body even for 4xx replies.
        let reply = response.json::<ApiReply>().await.ok();

        match reply {
            Some(ApiReply { ok: true, .. }) if status.is_success() => {
                debug!("Telegram accepted message.");
                Ok(())
            }
            Some(ApiReply { description, .. }) => Err(TransportError::Api {
                status: status.as_u16(),
                description: description.unwrap_or_else(|| status.to_string()),
            }),
            None => Err(TransportError::Api {
                status: status.as_u16(),
                description: format!("unreadable reply ({})", status),
            }),
        }
    }
}

/// Converts a `reqwest` error without leaking the token-bearing URL.
fn map_request_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(e.without_url().to_string())
    }
}
