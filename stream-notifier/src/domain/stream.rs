//! Stream status snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the status provider reported for a live broadcaster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    /// Stream title.
    pub title: String,
    /// Category / game name; empty when the broadcaster has not set one.
    pub category: String,
    pub viewer_count: u64,
    pub started_at: Option<DateTime<Utc>>,
}

impl From<twitch_helix::HelixStream> for StreamSnapshot {
    fn from(stream: twitch_helix::HelixStream) -> Self {
        Self {
            title: stream.title,
            category: stream.game_name,
            viewer_count: stream.viewer_count,
            started_at: stream.started_at,
        }
    }
}
