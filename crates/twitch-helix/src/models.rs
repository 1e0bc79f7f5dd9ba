use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope returned by `GET /streams`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsResponse {
    pub data: Vec<HelixStream>,
}

/// A single live stream entry.
///
/// Helix only returns entries for channels that are currently live, so the
/// presence of an entry is what signals "live".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelixStream {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_login: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewer_count: u64,
    #[serde(rename = "type", default)]
    pub stream_type: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}
