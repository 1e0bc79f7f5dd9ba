//! Telegram Bot API gateway.
//!
//! Posts announcements via `POST /bot<token>/sendMessage` and retracts them via
//! `POST /bot<token>/deleteMessage`. Failures are classified into
//! [`DeliveryError`] from the `error_code`/`description` envelope. A 429 is
//! surfaced as [`DeliveryError::RateLimited`] with the `parameters.retry_after`
//! hint instead of being retried here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::notification::gateway::{DeliveryError, MessagingGateway};

/// Production Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Telegram `sendMessage` text limit (UTF-8 characters).
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Suffix appended to truncated messages. Contains no MarkdownV2 specials.
const TRUNCATION_SUFFIX: &str = "\n\n\u{2026}";

/// Telegram gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram Bot API token.
    pub bot_token: String,
    /// Bot API base URL (overridable for local Bot API servers).
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Parse mode for message formatting.
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_parse_mode() -> String {
    "MarkdownV2".to_string()
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: default_api_url(),
            parse_mode: default_parse_mode(),
        }
    }
}

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// [`MessagingGateway`] backed by the Telegram Bot API.
pub struct TelegramGateway {
    config: TelegramConfig,
    client: Client,
}

impl TelegramGateway {
    pub fn new(config: TelegramConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> Result<T, DeliveryError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let envelope: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(method, %status, error = %e, "Unparseable Telegram response");
                return Err(DeliveryError::Api {
                    code: i64::from(status.as_u16()),
                    description: body,
                });
            }
        };

        if envelope.ok
            && let Some(result) = envelope.result
        {
            return Ok(result);
        }

        let code = envelope
            .error_code
            .unwrap_or_else(|| i64::from(status.as_u16()));
        let description = envelope.description.unwrap_or_default();
        let retry_after = envelope
            .parameters
            .and_then(|p| p.retry_after)
            .map(Duration::from_secs);

        Err(classify_error(code, description, retry_after))
    }
}

/// Map a Bot API failure onto the delivery taxonomy.
fn classify_error(code: i64, description: String, retry_after: Option<Duration>) -> DeliveryError {
    match code {
        429 => DeliveryError::RateLimited { retry_after },
        403 => DeliveryError::Forbidden(description),
        400 | 404 if description.to_lowercase().contains("not found") => {
            DeliveryError::NotFound(description)
        }
        _ => DeliveryError::Api { code, description },
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, destination_id: i64, text: &str) -> Result<i64, DeliveryError> {
        let payload = json!({
            "chat_id": destination_id,
            "text": truncate_message(text, TELEGRAM_MESSAGE_LIMIT),
            "parse_mode": self.config.parse_mode,
        });

        let sent: SentMessage = self.call("sendMessage", &payload).await?;
        debug!(destination_id, message_id = sent.message_id, "Telegram message sent");
        Ok(sent.message_id)
    }

    async fn delete(&self, destination_id: i64, message_id: i64) -> Result<(), DeliveryError> {
        let payload = json!({
            "chat_id": destination_id,
            "message_id": message_id,
        });

        let _: bool = self.call("deleteMessage", &payload).await?;
        debug!(destination_id, message_id, "Telegram message deleted");
        Ok(())
    }
}

/// Truncate a message to fit within the Telegram character limit.
///
/// Never leaves a dangling MarkdownV2 escape at the cut.
fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let budget = limit - TRUNCATION_SUFFIX.chars().count();
    let mut truncated: String = text.chars().take(budget).collect();

    let trailing_backslashes = truncated.chars().rev().take_while(|c| *c == '\\').count();
    if trailing_backslashes % 2 == 1 {
        truncated.pop();
    }

    format!("{truncated}{TRUNCATION_SUFFIX}")
}
