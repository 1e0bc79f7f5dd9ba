//! Live status detection.
//!
//! Wraps the Helix client behind [`StatusProvider`]. Provider failures never
//! leave this module as errors: a failed or timed-out check is reported as
//! [`LiveStatus::Unavailable`] and simply retried on the next tick.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use twitch_helix::{HelixClient, HelixError};

use super::rate_limiter::RateLimiter;
use crate::domain::{BroadcasterHandle, StreamSnapshot};

/// Longest back-off honoured from a `Ratelimit-Reset` header.
const MAX_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// Result of a single status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveStatus {
    Live(StreamSnapshot),
    Offline,
    /// The check failed or timed out. Reads as not live, but must not end a
    /// broadcast that is already recorded as live.
    Unavailable,
}

impl LiveStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, LiveStatus::Live(_))
    }

    pub fn snapshot(&self) -> Option<&StreamSnapshot> {
        match self {
            LiveStatus::Live(snapshot) => Some(snapshot),
            LiveStatus::Offline | LiveStatus::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, LiveStatus::Unavailable)
    }
}

/// Source of live status for broadcasters.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Check whether `handle` is live. Never fails; errors are reported as
    /// [`LiveStatus::Unavailable`].
    async fn check(&self, handle: &BroadcasterHandle) -> LiveStatus;
}

/// [`StatusProvider`] backed by Twitch Helix.
pub struct HelixStatusProvider {
    client: HelixClient,
    rate_limiter: RateLimiter,
    request_timeout: Duration,
}

impl HelixStatusProvider {
    pub fn new(client: HelixClient, rate_limiter: RateLimiter, request_timeout: Duration) -> Self {
        Self {
            client,
            rate_limiter,
            request_timeout,
        }
    }

    async fn handle_error(&self, handle: &BroadcasterHandle, err: HelixError) {
        match &err {
            HelixError::RateLimited { reset } => {
                let backoff = reset
                    .map(|r| (r - Utc::now().timestamp()).max(1) as u64)
                    .map(Duration::from_secs)
                    .unwrap_or(Duration::from_secs(1))
                    .min(MAX_RATE_LIMIT_BACKOFF);
                warn!(broadcaster = %handle, backoff = ?backoff, "Helix rate limit hit, backing off");
                self.rate_limiter.back_off(backoff).await;
            }
            HelixError::Unauthorized => {
                warn!(broadcaster = %handle, "Helix rejected the access token");
            }
            _ => {
                warn!(broadcaster = %handle, error = %err, "Status check failed");
            }
        }
    }
}

#[async_trait]
impl StatusProvider for HelixStatusProvider {
    async fn check(&self, handle: &BroadcasterHandle) -> LiveStatus {
        self.rate_limiter.acquire().await;

        let result =
            tokio::time::timeout(self.request_timeout, self.client.get_stream(handle.as_str()))
                .await;

        match result {
            Ok(Ok(Some(stream))) => {
                debug!(broadcaster = %handle, title = %stream.title, "Broadcaster is live");
                LiveStatus::Live(stream.into())
            }
            Ok(Ok(None)) => LiveStatus::Offline,
            Ok(Err(err)) => {
                self.handle_error(handle, err).await;
                LiveStatus::Unavailable
            }
            Err(_) => {
                warn!(
                    broadcaster = %handle,
                    timeout = ?self.request_timeout,
                    "Status check timed out"
                );
                LiveStatus::Unavailable
            }
        }
    }
}
