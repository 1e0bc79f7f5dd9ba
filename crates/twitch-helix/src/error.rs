use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelixError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unauthorized: access token rejected")]
    Unauthorized,
    #[error("rate limited (reset at {reset:?})")]
    RateLimited {
        /// Unix timestamp (seconds) at which the bucket refills, if reported.
        reset: Option<i64>,
    },
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

impl HelixError {
    /// Whether retrying the same request later can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            HelixError::Http(_) | HelixError::RateLimited { .. } => true,
            HelixError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
