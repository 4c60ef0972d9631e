use chrono::{DateTime, Utc};
use common::GameId;
use serde::{Deserialize, Serialize};

pub type UserId = i32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Display data joined into leaderboard rows at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub profile_picture: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            profile_picture: user.profile_picture.clone(),
        }
    }
}

/// One play result. Never updated or deleted once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    /// Store-assigned, increasing in insertion order
    pub id: i64,
    pub user_id: UserId,
    pub game_id: GameId,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

/// A score that passed validation and is about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScore {
    pub user_id: UserId,
    pub game_id: GameId,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    /// `Some(None)` clears the picture
    pub profile_picture: Option<Option<String>>,
}
