//! Outbound request pacing for the status provider.
//!
//! A token bucket shared by every broadcaster check, so a tick with many
//! broadcasters does not burst past the platform's request budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::trace;

use crate::{Error, Result};

/// Slowest accepted budget: one request every 100 seconds.
pub const MIN_RPS: f64 = 0.01;

/// Longest single wait for a token.
const MAX_TOKEN_WAIT: Duration = Duration::from_secs(3600);

/// Token bucket parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Burst capacity.
    pub max_tokens: u32,
    /// Tokens added per second.
    pub refill_rate: f64,
}

impl RateLimiterConfig {
    /// Bucket for a requests-per-second budget, allowing a burst of twice that.
    pub fn with_rps(rps: f64) -> Result<Self> {
        if !rps.is_finite() || rps < MIN_RPS {
            return Err(Error::config(format!(
                "rate limit must be a finite number of at least {} requests per second, got {}",
                MIN_RPS, rps
            )));
        }

        Ok(Self {
            max_tokens: (rps * 2.0).ceil().max(1.0) as u32,
            refill_rate: rps,
        })
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
    /// Set when the platform told us to back off.
    blocked_until: Option<Instant>,
}

impl TokenBucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// Take a token, or report how long until one is available.
    fn try_take(&mut self, now: Instant) -> std::result::Result<(), Duration> {
        if let Some(until) = self.blocked_until {
            if until > now {
                return Err(until - now);
            }
            self.blocked_until = None;
        }

        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let wait = Duration::try_from_secs_f64((1.0 - self.tokens) / self.refill_rate)
                .unwrap_or(MAX_TOKEN_WAIT);
            Err(wait.min(MAX_TOKEN_WAIT))
        }
    }
}

/// Shared, cancel-safe token bucket.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    bucket: Arc<Mutex<TokenBucket>>,
}

impl RateLimiter {
    /// Create a limiter that starts with a full bucket.
    pub fn new(config: RateLimiterConfig) -> Self {
        let max_tokens = f64::from(config.max_tokens.max(1));
        Self {
            bucket: Arc::new(Mutex::new(TokenBucket {
                tokens: max_tokens,
                max_tokens,
                refill_rate: config.refill_rate,
                last_refill: Instant::now(),
                blocked_until: None,
            })),
        }
    }

    pub async fn try_acquire(&self) -> bool {
        self.bucket.lock().await.try_take(Instant::now()).is_ok()
    }

    /// Acquire a token, waiting if necessary. Returns the time spent waiting.
    ///
    /// # Cancel Safety
    ///
    /// The lock is never held across the sleep, so dropping this future leaves
    /// the bucket untouched and other callers unblocked.
    pub async fn acquire(&self) -> Duration {
        let mut total_wait = Duration::ZERO;

        loop {
            let wait = match self.bucket.lock().await.try_take(Instant::now()) {
                Ok(()) => return total_wait,
                Err(wait) => wait,
            };

            trace!(wait = ?wait, "rate limited");
            tokio::time::sleep(wait).await;
            total_wait += wait;
        }
    }

    /// Stop handing out tokens for `duration` and empty the bucket.
    pub async fn back_off(&self, duration: Duration) {
        let mut bucket = self.bucket.lock().await;
        let until = Instant::now() + duration;
        let until = bucket.blocked_until.map_or(until, |u| u.max(until));
        bucket.blocked_until = Some(until);
        bucket.tokens = 0.0;
        // Nothing accrues while blocked.
        bucket.last_refill = until;
    }
}
