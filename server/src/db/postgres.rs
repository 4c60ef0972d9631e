use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;

use common::GameId;

use super::models::*;
use super::{ScoreStore, UserStore, UsernameTaken};

pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ScoreRow {
    id: i64,
    user_id: i32,
    game_id: String,
    score: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<ScoreRow> for ScoreRecord {
    type Error = anyhow::Error;

    fn try_from(row: ScoreRow) -> Result<Self> {
        let game_id = row
            .game_id
            .parse::<GameId>()
            .with_context(|| format!("Score {} has an unknown game id", row.id))?;
        Ok(ScoreRecord {
            id: row.id,
            user_id: row.user_id,
            game_id,
            score: row.score,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    password_hash: String,
    email: Option<String>,
    profile_picture: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            email: row.email,
            profile_picture: row.profile_picture,
            created_at: row.created_at,
        }
    }
}

fn into_records(rows: Vec<ScoreRow>) -> Result<Vec<ScoreRecord>> {
    rows.into_iter().map(ScoreRecord::try_from).collect()
}

const USER_COLUMNS: &str = "id, username, password_hash, email, profile_picture, created_at";

#[async_trait]
impl ScoreStore for PostgresDatabase {
    async fn append_score(&self, score: NewScore) -> Result<ScoreRecord> {
        let row: ScoreRow = sqlx::query_as(
            r#"
            INSERT INTO scores (user_id, game_id, score, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, game_id, score, created_at
            "#,
        )
        .bind(score.user_id)
        .bind(score.game_id.as_str())
        .bind(score.score)
        .bind(score.created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert score")?;

        row.try_into()
    }

    async fn scores_for_game(&self, game_id: GameId) -> Result<Vec<ScoreRecord>> {
        let rows: Vec<ScoreRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, game_id, score, created_at
            FROM scores
            WHERE game_id = $1
            ORDER BY id
            "#,
        )
        .bind(game_id.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to load scores for game")?;

        into_records(rows)
    }

    async fn recent_scores(&self, game_id: GameId, limit: usize) -> Result<Vec<ScoreRecord>> {
        let rows: Vec<ScoreRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, game_id, score, created_at
            FROM scores
            WHERE game_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(game_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load recent scores")?;

        into_records(rows)
    }

    async fn scores_for_user(&self, user_id: UserId) -> Result<Vec<ScoreRecord>> {
        let rows: Vec<ScoreRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, game_id, score, created_at
            FROM scores
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load scores for user")?;

        into_records(rows)
    }
}

#[async_trait]
impl UserStore for PostgresDatabase {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
    ) -> Result<User> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (username, password_hash, email) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(username)
        .bind(password_hash)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| username_conflict(e, username, "Failed to create user"))?;

        Ok(row.into())
    }

    async fn get_user_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to get user by id")?;

        Ok(row.map(User::from))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS))
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to get user by username")?;

        Ok(row.map(User::from))
    }

    async fn update_profile(&self, user_id: UserId, update: &ProfileUpdate) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                profile_picture = CASE WHEN $3 THEN $4 ELSE profile_picture END
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(update.username.as_deref())
        .bind(update.profile_picture.is_some())
        .bind(update.profile_picture.clone().flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            let username = update.username.as_deref().unwrap_or_default();
            username_conflict(e, username, "Failed to update user profile")
        })?;

        Ok(row.map(User::from))
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .context("Failed to update password")?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_profiles(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(i32, String, Option<String>)> = sqlx::query_as(
            "SELECT id, username, profile_picture FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load user profiles")?;

        Ok(rows
            .into_iter()
            .map(|(id, username, profile_picture)| {
                (id, UserProfile { username, profile_picture })
            })
            .collect())
    }
}

/// The unique index on `users.username` is the final arbiter of name clashes.
fn username_conflict(err: sqlx::Error, username: &str, context: &'static str) -> anyhow::Error {
    let unique_violation = err
        .as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation());
    if unique_violation {
        UsernameTaken(username.to_string()).into()
    } else {
        anyhow::Error::new(err).context(context)
    }
}
