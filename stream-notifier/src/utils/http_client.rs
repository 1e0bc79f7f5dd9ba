use std::{sync::OnceLock, time::Duration};

use tracing::debug;

use crate::Result;

/// User agent sent on every outbound request.
const USER_AGENT: &str = concat!("stream-notifier/", env!("CARGO_PKG_VERSION"));

/// Install the process-wide rustls crypto provider. Idempotent.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build a client with the crate's user agent and a per-request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    install_rustls_provider();
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| crate::Error::Other(format!("Failed to build HTTP client: {}", e)))
}
