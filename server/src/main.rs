use anyhow::{Context, Result};
use refinery::config::Config;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gamehub::api::jwt::{Authenticator, JwtManager};
use gamehub::api::{HubState, run_api_server};
use gamehub::config::HubConfig;
use gamehub::db::{InMemoryDatabase, PostgresDatabase, ScoreStore, UserStore};
use gamehub::notifier::{LocalNotifier, Notifier, RedisNotifier};

mod migrations {
    use refinery::embed_migrations;
    embed_migrations!("./migrations");
}

async fn connect_stores(config: &HubConfig) -> Result<(Arc<dyn ScoreStore>, Arc<dyn UserStore>)> {
    let Some(database_url) = &config.database_url else {
        warn!("GAMEHUB_DATABASE_URL not set; scores and users are kept in memory only");
        let db = Arc::new(InMemoryDatabase::new());
        let scores: Arc<dyn ScoreStore> = db.clone();
        let users: Arc<dyn UserStore> = db;
        return Ok((scores, users));
    };

    let mut db_config: Config = database_url
        .parse()
        .context("GAMEHUB_DATABASE_URL is not a valid PostgreSQL URL")?;
    migrations::migrations::runner()
        .run_async(&mut db_config)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(database_url)
        .await
        .context("Failed to create PostgreSQL connection pool")?;

    let db = Arc::new(PostgresDatabase::new(pool));
    let scores: Arc<dyn ScoreStore> = db.clone();
    let users: Arc<dyn UserStore> = db;
    Ok((scores, users))
}

async fn connect_notifier(
    config: &HubConfig,
    cancellation_token: CancellationToken,
) -> Result<Arc<dyn Notifier>> {
    match &config.redis_url {
        Some(redis_url) => {
            let notifier = RedisNotifier::connect(redis_url, cancellation_token).await?;
            info!("Live updates are shared through Redis");
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LocalNotifier::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = HubConfig::from_env()?;
    let cancellation_token = CancellationToken::new();

    let (scores, users) = connect_stores(&config).await?;
    let notifier = connect_notifier(&config, cancellation_token.clone()).await?;

    let jwt_manager = Arc::new(JwtManager::new(&config.jwt_secret));
    let authenticator: Arc<dyn Authenticator> = jwt_manager.clone();

    let state = HubState::new(
        scores,
        users,
        notifier,
        jwt_manager,
        authenticator,
        cancellation_token.clone(),
    );

    let http_addr = config.http_addr.clone();
    let web_dir = config.web_dir.clone();
    let mut server = tokio::spawn(async move {
        run_api_server(&http_addr, state, web_dir.as_deref()).await
    });

    info!("Game hub started. Waiting for shutdown signal (Ctrl+C)...");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Received shutdown signal. Shutting down gracefully...");
            cancellation_token.cancel();
        }
        result = &mut server => {
            // The server only returns on its own when it failed to start or crashed
            cancellation_token.cancel();
            return result.context("HTTP server task panicked")?;
        }
    }

    server.await.context("HTTP server task panicked")??;
    info!("Game hub shut down successfully");
    Ok(())
}
