//! Messaging gateway seam.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failure to deliver or retract a single message.
///
/// Always recovered per destination: logged, never retried within a tick.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The bot lost permission to post (kicked, blocked, demoted).
    #[error("delivery forbidden: {0}")]
    Forbidden(String),

    /// The destination or the message no longer exists.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },
}

impl DeliveryError {
    /// Whether the failure means the target is gone for good.
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Forbidden(_) | DeliveryError::NotFound(_))
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Transport(err.to_string())
    }
}

/// Send/delete capability against a messaging platform.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Gateway name for logs.
    fn name(&self) -> &'static str;

    /// Post `text` to `destination_id`, returning the platform message id.
    async fn send(&self, destination_id: i64, text: &str) -> Result<i64, DeliveryError>;

    /// Delete a previously sent message.
    async fn delete(&self, destination_id: i64, message_id: i64) -> Result<(), DeliveryError>;
}
