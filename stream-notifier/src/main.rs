use anyhow::Context;
use stream_notifier::config::AppConfig;
use stream_notifier::logging;
use stream_notifier::services::ServiceContainer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let logging = logging::init_logging(config.log_format, config.log_dir.as_deref())?;

    let container = ServiceContainer::new(&config)
        .await
        .context("failed to initialize services")?;
    logging.start_retention_cleanup(container.cancellation_token());

    let shutdown = container.cancellation_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    info!(
        poll_interval = ?config.poll_interval,
        database = %config.database_url,
        "stream-notifier started"
    );
    container.run().await;

    Ok(())
}
