pub mod memory;
pub mod models;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use common::GameId;
use models::*;

pub use memory::InMemoryDatabase;
pub use postgres::PostgresDatabase;

/// Append-only score log.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Atomically appends one record and returns it with its assigned id.
    async fn append_score(&self, score: NewScore) -> Result<ScoreRecord>;

    /// Every record for a game, in insertion order.
    async fn scores_for_game(&self, game_id: GameId) -> Result<Vec<ScoreRecord>>;

    /// The `limit` newest records for a game, newest first.
    async fn recent_scores(&self, game_id: GameId, limit: usize) -> Result<Vec<ScoreRecord>>;

    /// Every record a user has submitted, across games, in insertion order.
    async fn scores_for_user(&self, user_id: UserId) -> Result<Vec<ScoreRecord>>;
}

/// A store refused a username because another account holds it. Carried
/// inside `anyhow::Error` so callers can tell it apart from outages.
#[derive(Debug, Error)]
#[error("Username already exists")]
pub struct UsernameTaken(pub String);

/// User accounts and the display directory used to enrich rankings.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
    ) -> Result<User>;
    async fn get_user_by_id(&self, user_id: UserId) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn update_profile(&self, user_id: UserId, update: &ProfileUpdate) -> Result<Option<User>>;

    /// Replaces the stored hash. `false` if the user does not exist.
    async fn update_password(&self, user_id: UserId, password_hash: &str) -> Result<bool>;

    /// Current display data for each id that exists. Unknown ids are absent.
    async fn get_profiles(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>>;
}
