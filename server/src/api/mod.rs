pub mod auth;
pub mod error;
pub mod jwt;
pub mod leaderboard;
pub mod middleware;
pub mod rate_limit;
pub mod scores;
pub mod server;
pub mod users;

pub use server::{build_router, run_api_server, serve};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::aggregator::Aggregator;
use crate::db::{ScoreStore, UserStore};
use crate::ingestion::ScoreIngestion;
use crate::notifier::Notifier;
use jwt::{Authenticator, JwtManager};

/// Everything the HTTP and WebSocket handlers share.
#[derive(Clone)]
pub struct HubState {
    pub aggregator: Aggregator,
    pub ingestion: ScoreIngestion,
    pub users: Arc<dyn UserStore>,
    pub notifier: Arc<dyn Notifier>,
    /// Issues tokens at register/login
    pub jwt_manager: Arc<JwtManager>,
    /// Verifies bearer tokens on protected routes
    pub authenticator: Arc<dyn Authenticator>,
    pub cancellation_token: CancellationToken,
}

impl HubState {
    pub fn new(
        scores: Arc<dyn ScoreStore>,
        users: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
        jwt_manager: Arc<JwtManager>,
        authenticator: Arc<dyn Authenticator>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(scores.clone(), users.clone()),
            ingestion: ScoreIngestion::new(scores, notifier.clone()),
            users,
            notifier,
            jwt_manager,
            authenticator,
            cancellation_token,
        }
    }
}
