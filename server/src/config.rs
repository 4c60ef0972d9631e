use anyhow::{Context, Result};
use std::env;

/// Runtime settings, read from the environment (and `.env` via dotenv).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// HTTP + WebSocket listen address
    pub http_addr: String,
    /// PostgreSQL URL; without one the hub keeps everything in memory
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    /// Redis URL; when set, live updates are shared across hub instances
    pub redis_url: Option<String>,
    /// Directory of static front-end files to serve
    pub web_dir: Option<String>,
}

impl HubConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let http_addr = non_empty("GAMEHUB_HTTP_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());

        let db_max_connections = match non_empty("GAMEHUB_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("GAMEHUB_DB_MAX_CONNECTIONS is not a number: {}", raw))?,
            None => 5,
        };

        let jwt_secret = non_empty("GAMEHUB_JWT_SECRET")
            .context("GAMEHUB_JWT_SECRET must be set in environment or .env file")?;

        Ok(Self {
            http_addr,
            database_url: non_empty("GAMEHUB_DATABASE_URL"),
            db_max_connections,
            jwt_secret,
            redis_url: non_empty("GAMEHUB_REDIS_URL"),
            web_dir: non_empty("GAMEHUB_WEB_DIR"),
        })
    }
}
