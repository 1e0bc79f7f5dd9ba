//! Broadcaster handles.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Twitch login names: lowercase ASCII letters, digits and underscores.
static HANDLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{1,25}$").unwrap());

/// Channel URLs pasted instead of a bare login.
static CHANNEL_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:https?://)?(?:www\.|m\.)?twitch\.tv/([^/?#]+)").unwrap());

/// A normalized (lowercase) broadcaster handle.
///
/// Handles are case-insensitive on the platform, so every handle entering the
/// system goes through [`BroadcasterHandle::parse`] and is compared in its
/// lowercase form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BroadcasterHandle(String);

impl BroadcasterHandle {
    /// Normalize and validate a user-supplied handle.
    ///
    /// Accepts `alice`, ` Alice `, `@alice` and `https://twitch.tv/alice`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let candidate = match CHANNEL_URL_REGEX.captures(trimmed) {
            Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
            None => trimmed.trim_start_matches('@'),
        };
        let normalized = candidate.to_lowercase();

        if !HANDLE_REGEX.is_match(&normalized) {
            return Err(Error::validation(format!(
                "invalid broadcaster handle: {:?}",
                input
            )));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public channel URL for this broadcaster.
    pub fn channel_url(&self) -> String {
        format!("https://twitch.tv/{}", self.0)
    }
}

impl fmt::Display for BroadcasterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BroadcasterHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BroadcasterHandle {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<BroadcasterHandle> for String {
    fn from(handle: BroadcasterHandle) -> Self {
        handle.0
    }
}
