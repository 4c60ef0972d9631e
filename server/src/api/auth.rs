use anyhow::Context;
use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::HubState;
use super::error::ApiError;
use crate::db::models::{User, UserId};
use crate::error::{HubError, HubResult};

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub profile_picture: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            profile_picture: user.profile_picture.unwrap_or_default(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

/// Username rules: 3-30 characters of letters, digits, `_` or `-`, not
/// starting or ending with `_`/`-`. Returns every rule that is broken.
pub fn validate_username(username: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let length = username.chars().count();

    if length < 3 {
        errors.push("Username must be at least 3 characters long".to_string());
    }
    if length > 30 {
        errors.push("Username must be at most 30 characters long".to_string());
    }
    if !username.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        errors.push("Username can only contain letters, numbers, underscores, and hyphens".to_string());
    }
    if username.starts_with(['_', '-']) || username.ends_with(['_', '-']) {
        errors.push("Username cannot start or end with underscore or hyphen".to_string());
    }

    errors
}

pub(crate) fn check_username(username: &str) -> HubResult<()> {
    let errors = validate_username(username);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(HubError::Validation(errors.join(", ")))
    }
}

pub(crate) fn check_password(password: &str) -> HubResult<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(HubError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Tokens and user details must not be cached by intermediaries.
fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate, private"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

pub(crate) async fn hash_password(password: String) -> HubResult<String> {
    let hashed = tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .context("Password hashing task failed")?
        .context("Failed to hash password")?;
    Ok(hashed)
}

pub(crate) async fn password_matches(password: String, password_hash: String) -> HubResult<bool> {
    let valid = tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .context("Password verification task failed")?
        .context("Failed to verify password")?;
    Ok(valid)
}

/// POST /auth/register
pub async fn register(
    State(state): State<HubState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let username = req.username.trim().to_string();
    check_username(&username)?;
    check_password(&req.password)?;

    if state.users.get_user_by_username(&username).await.map_err(HubError::from)?.is_some() {
        return Err(HubError::Conflict("Username already exists".to_string()).into());
    }

    let password_hash = hash_password(req.password).await?;
    let email = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty());

    let user = state
        .users
        .create_user(&username, &password_hash, email)
        .await
        .map_err(HubError::from)?;

    let token = state
        .jwt_manager
        .generate_token(user.id, &user.username)
        .map_err(HubError::from)?;

    info!("User registered successfully: {}", user.username);

    let body = AuthResponse { token, user: user.into() };
    Ok(no_store((StatusCode::CREATED, Json(body)).into_response()))
}

/// POST /auth/login
pub async fn login(
    State(state): State<HubState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let invalid = || HubError::Unauthorized("Invalid username or password".to_string());

    let user = state
        .users
        .get_user_by_username(req.username.trim())
        .await
        .map_err(HubError::from)?
        .ok_or_else(invalid)?;

    if !password_matches(req.password, user.password_hash.clone()).await? {
        return Err(invalid().into());
    }

    let token = state
        .jwt_manager
        .generate_token(user.id, &user.username)
        .map_err(HubError::from)?;

    info!("User logged in successfully: {}", user.username);

    Ok(no_store(Json(AuthResponse { token, user: user.into() }).into_response()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::jwt::JwtManager;
    use crate::db::models::ProfileUpdate;
    use crate::db::{InMemoryDatabase, UserStore};
    use crate::notifier::LocalNotifier;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    /// Answers every name lookup with "free", like a second request that read
    /// the table just before the first one inserted.
    struct StaleLookups(InMemoryDatabase);

    #[async_trait]
    impl UserStore for StaleLookups {
        async fn create_user(&self, username: &str, password_hash: &str, email: Option<&str>) -> Result<User> {
            self.0.create_user(username, password_hash, email).await
        }

        async fn get_user_by_id(&self, user_id: UserId) -> Result<Option<User>> {
            self.0.get_user_by_id(user_id).await
        }

        async fn get_user_by_username(&self, _username: &str) -> Result<Option<User>> {
            Ok(None)
        }

        async fn update_profile(&self, user_id: UserId, update: &ProfileUpdate) -> Result<Option<User>> {
            self.0.update_profile(user_id, update).await
        }

        async fn update_password(&self, user_id: UserId, password_hash: &str) -> Result<bool> {
            self.0.update_password(user_id, password_hash).await
        }

        async fn get_profiles(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, crate::db::models::UserProfile>> {
            self.0.get_profiles(user_ids).await
        }
    }

    fn stale_state() -> HubState {
        let jwt_manager = Arc::new(JwtManager::new("auth-test"));
        HubState::new(
            Arc::new(InMemoryDatabase::new()),
            Arc::new(StaleLookups(InMemoryDatabase::new())),
            Arc::new(LocalNotifier::new()),
            jwt_manager.clone(),
            jwt_manager,
            CancellationToken::new(),
        )
    }

    fn signup(username: &str) -> Json<RegisterRequest> {
        Json(RegisterRequest {
            username: username.to_string(),
            password: "hunter22".to_string(),
            email: None,
        })
    }

    #[tokio::test]
    async fn losing_a_registration_race_is_a_conflict() {
        let state = stale_state();
        let first = register(State(state.clone()), signup("racer")).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = match register(State(state), signup("racer")).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        };
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let body = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"Username already exists"}"#);
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(matches!(check_password("12345"), Err(HubError::Validation(_))));
        assert!(check_password("123456").is_ok());
    }

    #[test]
    fn accepts_reasonable_usernames() {
        for name in ["bob", "snake_master", "quiz-whiz-2000", "ÅsaÖ"] {
            assert!(validate_username(name).is_empty(), "{name}");
        }
    }

    #[test]
    fn reports_each_broken_rule() {
        assert_eq!(validate_username("ab").len(), 1);
        assert_eq!(validate_username(&"x".repeat(31)).len(), 1);
        assert_eq!(validate_username("bad name!").len(), 1);
        assert_eq!(validate_username("_a").len(), 2);
    }
}
