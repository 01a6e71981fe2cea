use crate::configuration::Settings;
use crate::connections::{ConnectionService, PgConnectionStore};
use crate::db::DbPool;
use crate::delivery::DeliveryAccounting;
use crate::discord::{ChatPlatform, DiscordApiClient, GroupAuthorizer};
use crate::feeds::FeedService;
use crate::verifier::DestinationVerifier;
use anyhow::Context;
use std::sync::Arc;

embed_migrations!();

/// Every component, wired from settings. Outer layers (HTTP, workers) hold
/// one of these and call into it.
pub struct Application {
    pub pool: DbPool,
    pub connections: ConnectionService,
    pub feeds: FeedService,
    pub deliveries: DeliveryAccounting,
}

impl Application {
    pub fn build(configuration: &Settings) -> Result<Self, anyhow::Error> {
        let pool = DbPool::from_settings(&configuration.database);
        let discord = Arc::new(DiscordApiClient::from_settings(&configuration.discord)?);
        Ok(Self::with_collaborators(
            pool,
            discord.clone(),
            discord,
            configuration.feeds.default_refresh_rate_seconds,
        ))
    }

    pub fn with_collaborators(
        pool: DbPool,
        platform: Arc<dyn ChatPlatform>,
        authorizer: Arc<dyn GroupAuthorizer>,
        default_refresh_rate_seconds: u32,
    ) -> Self {
        let verifier = DestinationVerifier::new(platform, authorizer);
        let store = Arc::new(PgConnectionStore::new(pool.clone()));
        Self {
            connections: ConnectionService::new(verifier, store),
            feeds: FeedService::new(pool.clone(), default_refresh_rate_seconds),
            deliveries: DeliveryAccounting::new(pool.clone()),
            pool,
        }
    }
}

#[tracing::instrument(name = "Running database migrations", skip(pool))]
pub async fn run_migrations(pool: &DbPool) -> Result<(), anyhow::Error> {
    pool.run(|conn| embedded_migrations::run(conn))
        .await?
        .context("Failed to run database migrations.")
}
