use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use common::GameId;

use super::models::*;
use super::{ScoreStore, UserStore, UsernameTaken};

/// Process-local store used when no database is configured, and by tests.
/// Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryDatabase {
    scores: RwLock<Vec<ScoreRecord>>,
    users: RwLock<Vec<User>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreStore for InMemoryDatabase {
    async fn append_score(&self, score: NewScore) -> Result<ScoreRecord> {
        let mut scores = self.scores.write().await;
        let record = ScoreRecord {
            id: scores.len() as i64 + 1,
            user_id: score.user_id,
            game_id: score.game_id,
            score: score.score,
            created_at: score.created_at,
        };
        scores.push(record.clone());
        Ok(record)
    }

    async fn scores_for_game(&self, game_id: GameId) -> Result<Vec<ScoreRecord>> {
        let scores = self.scores.read().await;
        Ok(scores.iter().filter(|r| r.game_id == game_id).cloned().collect())
    }

    async fn recent_scores(&self, game_id: GameId, limit: usize) -> Result<Vec<ScoreRecord>> {
        let mut recent = self.scores_for_game(game_id).await?;
        recent.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn scores_for_user(&self, user_id: UserId) -> Result<Vec<ScoreRecord>> {
        let scores = self.scores.read().await;
        Ok(scores.iter().filter(|r| r.user_id == user_id).cloned().collect())
    }
}

#[async_trait]
impl UserStore for InMemoryDatabase {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
    ) -> Result<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == username) {
            return Err(UsernameTaken(username.to_string()).into());
        }
        let user = User {
            id: users.len() as UserId + 1,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            email: email.map(str::to_string),
            profile_picture: None,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn update_profile(&self, user_id: UserId, update: &ProfileUpdate) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        if let Some(username) = &update.username {
            if users.iter().any(|u| u.id != user_id && &u.username == username) {
                return Err(UsernameTaken(username.clone()).into());
            }
        }
        let Some(user) = users.iter_mut().find(|u| u.id == user_id) else {
            return Ok(None);
        };
        if let Some(username) = &update.username {
            user.username = username.clone();
        }
        if let Some(picture) = &update.profile_picture {
            user.profile_picture = picture.clone();
        }
        Ok(Some(user.clone()))
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_profiles(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .filter(|u| user_ids.contains(&u.id))
            .map(|u| (u.id, UserProfile::from(u)))
            .collect())
    }
}
