//! Application configuration.
//!
//! Read from environment variables (a `.env` file is loaded first by `main`)
//! and validated before anything starts.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::logging::LogFormat;
use crate::monitor::{MIN_RPS, RateLimiterConfig};
use crate::notification::{DEFAULT_PROMO_FOOTER, FanoutConfig};
use crate::scheduler::SchedulerConfig;
use crate::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:stream-notifier.db?mode=rwc";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 8;
const DEFAULT_MAX_CONCURRENT_DELIVERIES: usize = 8;
/// Helix app tokens get 800 points per minute.
const DEFAULT_HELIX_RATE_LIMIT_RPS: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    pub twitch_client_id: String,
    pub twitch_access_token: String,
    pub twitch_api_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub max_concurrent_checks: usize,
    pub max_concurrent_deliveries: usize,
    pub helix_rate_limit_rps: f64,
    /// Footer every non-privileged destination gets. Never blank.
    pub promo_footer: String,
    /// Directory for rotated log files; console only when unset.
    pub log_dir: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| Error::config(format!("{key} must be set")))
        };

        let config = Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| crate::notification::channels::DEFAULT_TELEGRAM_API_URL.to_string()),
            twitch_client_id: required("TWITCH_CLIENT_ID")?,
            twitch_access_token: required("TWITCH_ACCESS_TOKEN")?,
            twitch_api_url: get("TWITCH_API_URL")
                .unwrap_or_else(|| twitch_helix::DEFAULT_BASE_URL.to_string()),
            poll_interval: Duration::from_secs(parse_or(
                get("POLL_INTERVAL_SECS"),
                "POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            request_timeout: Duration::from_secs(parse_or(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            max_concurrent_checks: parse_or(
                get("MAX_CONCURRENT_CHECKS"),
                "MAX_CONCURRENT_CHECKS",
                DEFAULT_MAX_CONCURRENT_CHECKS,
            )?,
            max_concurrent_deliveries: parse_or(
                get("MAX_CONCURRENT_DELIVERIES"),
                "MAX_CONCURRENT_DELIVERIES",
                DEFAULT_MAX_CONCURRENT_DELIVERIES,
            )?,
            helix_rate_limit_rps: parse_or(
                get("HELIX_RATE_LIMIT_RPS"),
                "HELIX_RATE_LIMIT_RPS",
                DEFAULT_HELIX_RATE_LIMIT_RPS,
            )?,
            promo_footer: match lookup("PROMO_FOOTER") {
                Some(v) if v.trim().is_empty() => {
                    return Err(Error::config("PROMO_FOOTER must not be blank"));
                }
                Some(v) => v.trim().to_string(),
                None => DEFAULT_PROMO_FOOTER.to_string(),
            },
            log_dir: get("LOG_DIR").map(PathBuf::from),
            log_format: parse_or(get("LOG_FORMAT"), "LOG_FORMAT", LogFormat::Text)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(Error::config("REQUEST_TIMEOUT_SECS must be greater than zero"));
        }
        if self.max_concurrent_deliveries == 0 {
            return Err(Error::config("MAX_CONCURRENT_DELIVERIES must be at least 1"));
        }
        if self.promo_footer.trim().is_empty() {
            return Err(Error::config("PROMO_FOOTER must not be blank"));
        }
        if RateLimiterConfig::with_rps(self.helix_rate_limit_rps).is_err() {
            return Err(Error::config(format!(
                "HELIX_RATE_LIMIT_RPS must be a finite number of at least {MIN_RPS}"
            )));
        }
        self.scheduler_config().validate()
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self.poll_interval,
            max_concurrent_checks: self.max_concurrent_checks,
        }
    }

    pub fn fanout_config(&self) -> FanoutConfig {
        FanoutConfig {
            max_concurrent_deliveries: self.max_concurrent_deliveries,
            request_timeout: self.request_timeout,
        }
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::config(format!("invalid {key} {raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let mut env: HashMap<String, String> = [
            ("TELEGRAM_BOT_TOKEN", "123:ABC"),
            ("TWITCH_CLIENT_ID", "cid"),
            ("TWITCH_ACCESS_TOKEN", "token"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in vars {
            env.insert(k.to_string(), v.to_string());
        }
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.twitch_api_url, twitch_helix::DEFAULT_BASE_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.max_concurrent_checks, 8);
        assert_eq!(config.promo_footer, DEFAULT_PROMO_FOOTER);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_missing_required() {
        let err = AppConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));

        let err = load(&[("TWITCH_ACCESS_TOKEN", "  ")]).unwrap_err();
        assert!(err.to_string().contains("TWITCH_ACCESS_TOKEN"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("POLL_INTERVAL_SECS", "15"),
            ("MAX_CONCURRENT_DELIVERIES", "3"),
            ("HELIX_RATE_LIMIT_RPS", "2.5"),
            ("LOG_FORMAT", "json"),
            ("LOG_DIR", "/var/log/notifier"),
            ("PROMO_FOOTER", "  Brought to you by us "),
        ])
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.fanout_config().max_concurrent_deliveries, 3);
        assert_eq!(config.helix_rate_limit_rps, 2.5);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/notifier")));
        assert_eq!(config.promo_footer, "Brought to you by us");
    }

    #[test]
    fn test_blank_footer_rejected() {
        for blank in ["", "   "] {
            let err = load(&[("PROMO_FOOTER", blank)]).unwrap_err();
            assert!(err.to_string().contains("PROMO_FOOTER"));
        }
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&[("POLL_INTERVAL_SECS", "0")]).is_err());
        assert!(load(&[("POLL_INTERVAL_SECS", "soon")]).is_err());
        assert!(load(&[("MAX_CONCURRENT_CHECKS", "0")]).is_err());
        assert!(load(&[("REQUEST_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[("HELIX_RATE_LIMIT_RPS", "-1")]).is_err());
        assert!(load(&[("HELIX_RATE_LIMIT_RPS", "inf")]).is_err());
        assert!(load(&[("HELIX_RATE_LIMIT_RPS", "1e-300")]).is_err());
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
