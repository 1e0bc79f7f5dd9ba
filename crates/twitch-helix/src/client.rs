use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::error::HelixError;
use crate::models::{HelixStream, StreamsResponse};

/// Production Helix endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.twitch.tv/helix";

/// Header carrying the unix time at which the rate-limit bucket resets.
const RATELIMIT_RESET_HEADER: &str = "Ratelimit-Reset";

/// Client for the Helix endpoints used to detect live channels.
#[derive(Debug, Clone)]
pub struct HelixClient {
    client: Client,
    base_url: String,
    client_id: String,
    access_token: String,
}

impl HelixClient {
    /// Create a client against the production endpoint.
    pub fn new(client: Client, client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: client_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Point the client at a different Helix-compatible endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, HelixError> {
        let trimmed = base_url.trim_end_matches('/');
        Url::parse(trimmed)?;
        self.base_url = trimmed.to_string();
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Fetch the live stream for `login`, if any.
    ///
    /// Returns `Ok(None)` when the channel is offline (Helix answers with an
    /// empty `data` array).
    pub async fn get_stream(&self, login: &str) -> Result<Option<HelixStream>, HelixError> {
        let response = self
            .client
            .get(self.endpoint("streams"))
            .query(&[("user_login", login)])
            .header("Client-Id", &self.client_id)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        debug!(login, %status, "helix streams response");

        match status {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED => return Err(HelixError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => {
                let reset = response
                    .headers()
                    .get(RATELIMIT_RESET_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok());
                return Err(HelixError::RateLimited { reset });
            }
            other => {
                let body = response.text().await.unwrap_or_default();
                return Err(HelixError::Status {
                    status: other.as_u16(),
                    body,
                });
            }
        }

        let body = response.text().await?;
        let parsed: StreamsResponse = serde_json::from_str(&body)?;
        Ok(parsed.data.into_iter().next())
    }
}
