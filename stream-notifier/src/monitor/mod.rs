//! Stream monitor.
//!
//! - [`StatusProvider`] answers "is this broadcaster live?"
//! - [`RateLimiter`] paces provider calls
//! - [`StreamMonitor`] diffs each answer against the stored liveness record
//!   and drives delivery for the resulting transition

mod detector;
mod rate_limiter;
mod service;

pub use detector::{HelixStatusProvider, LiveStatus, StatusProvider};
pub use rate_limiter::{MIN_RPS, RateLimiter, RateLimiterConfig};
pub use service::StreamMonitor;
