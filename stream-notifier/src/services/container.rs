//! Service container for dependency injection.
//!
//! Builds the pool, repositories, provider, gateway, monitor and scheduler
//! from an [`AppConfig`] and owns the shutdown token.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::info;
use twitch_helix::HelixClient;

use crate::Result;
use crate::config::AppConfig;
use crate::database::repositories::{
    LivenessRepository, SqlxLivenessRepository, SqlxSubscriptionRepository, SqlxUserRepository,
    SubscriptionRepository, UserRepository,
};
use crate::database::{self, DbPool};
use crate::monitor::{HelixStatusProvider, RateLimiter, RateLimiterConfig, StreamMonitor};
use crate::notification::{
    DeliveryFanout, MessageComposer, TelegramConfig, TelegramGateway,
};
use crate::scheduler::Scheduler;
use crate::utils::http_client;

/// Service container holding all application services.
pub struct ServiceContainer {
    /// Database connection pool.
    pub pool: SqlitePool,
    /// Subscription store, shared with the command layer.
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub liveness: Arc<dyn LivenessRepository>,
    pub monitor: Arc<StreamMonitor>,
    pub scheduler: Arc<Scheduler>,
    /// Cancellation token for graceful shutdown.
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Open the database, apply migrations and build every service.
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let pool = database::init_pool(&config.database_url).await?;
        database::run_migrations(&pool).await?;
        Self::with_pool(pool, config)
    }

    /// Build every service on an already migrated pool.
    pub fn with_pool(pool: DbPool, config: &AppConfig) -> Result<Self> {
        info!("Initializing service container");

        let subscriptions: Arc<dyn SubscriptionRepository> =
            Arc::new(SqlxSubscriptionRepository::new(pool.clone()));
        let users: Arc<dyn UserRepository> = Arc::new(SqlxUserRepository::new(pool.clone()));
        let liveness: Arc<dyn LivenessRepository> =
            Arc::new(SqlxLivenessRepository::new(pool.clone()));

        let client = http_client::build_client(config.request_timeout)?;

        let helix = HelixClient::new(
            client.clone(),
            config.twitch_client_id.clone(),
            config.twitch_access_token.clone(),
        )
        .with_base_url(&config.twitch_api_url)?;
        let rate_limiter = RateLimiter::new(RateLimiterConfig::with_rps(
            config.helix_rate_limit_rps,
        )?);
        let provider = Arc::new(HelixStatusProvider::new(
            helix,
            rate_limiter,
            config.request_timeout,
        ));

        let gateway = Arc::new(TelegramGateway::new(
            TelegramConfig {
                api_url: config.telegram_api_url.clone(),
                ..TelegramConfig::new(config.telegram_bot_token.clone())
            },
            client,
        ));

        let fanout = DeliveryFanout::new(
            subscriptions.clone(),
            users.clone(),
            gateway,
            MessageComposer::new(config.promo_footer.clone())?,
            config.fanout_config(),
        );
        let monitor = Arc::new(StreamMonitor::new(
            subscriptions.clone(),
            liveness.clone(),
            provider,
            fanout,
        ));

        let cancellation_token = CancellationToken::new();
        let scheduler = Arc::new(Scheduler::new(
            monitor.clone(),
            config.scheduler_config(),
            cancellation_token.clone(),
        )?);

        info!("Service container initialized");

        Ok(Self {
            pool,
            subscriptions,
            users,
            liveness,
            monitor,
            scheduler,
            cancellation_token,
        })
    }

    /// Run the scheduler until [`ServiceContainer::shutdown`] is called.
    pub async fn run(&self) {
        self.scheduler.run().await;
        self.pool.close().await;
        info!("Service container stopped");
    }

    /// Stop scheduling new ticks; in-flight checks still finish.
    pub fn shutdown(&self) {
        info!("Initiating graceful shutdown");
        self.cancellation_token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
