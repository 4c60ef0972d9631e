use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use url::Url;

use super::HubState;
use super::auth::{UserInfo, check_password, check_username, hash_password, password_matches};
use super::error::ApiError;
use super::jwt::AuthenticatedUser;
use crate::db::models::{ProfileUpdate, UserId};
use crate::error::{HubError, HubResult};
use common::GameId;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: UserInfo,
    pub best_scores: BTreeMap<GameId, i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    /// An empty string removes the current picture
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    pub message: &'static str,
    pub user: UserInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn parse_profile_picture(raw: &str) -> HubResult<Option<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(url.to_string())),
        _ => Err(HubError::Validation("Profile picture must be a valid URL".to_string())),
    }
}

impl UpdateProfileRequest {
    fn into_update(self) -> HubResult<ProfileUpdate> {
        let username = match self.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                check_username(name)?;
                Some(name.to_string())
            }
            _ => None,
        };
        let profile_picture = self
            .profile_picture
            .as_deref()
            .map(parse_profile_picture)
            .transpose()?;

        Ok(ProfileUpdate { username, profile_picture })
    }
}

/// GET /users/profile
pub async fn get_profile(
    State(state): State<HubState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .users
        .get_user_by_id(auth.user_id)
        .await
        .map_err(HubError::from)?
        .ok_or_else(|| HubError::NotFound("User".to_string()))?;

    let best_scores = state.aggregator.best_scores_for_user(user.id).await?;

    Ok(Json(ProfileResponse {
        user: user.into(),
        best_scores,
    }))
}

/// PUT /users/profile
pub async fn update_profile(
    State(state): State<HubState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>, ApiError> {
    let update = req.into_update()?;

    if let Some(username) = &update.username {
        let taken = state
            .users
            .get_user_by_username(username)
            .await
            .map_err(HubError::from)?
            .is_some_and(|other| other.id != auth.user_id);
        if taken {
            return Err(HubError::Conflict("Username already taken".to_string()).into());
        }
    }

    let user = state
        .users
        .update_profile(auth.user_id, &update)
        .await
        .map_err(|e| match HubError::from(e) {
            HubError::Conflict(_) => HubError::Conflict("Username already taken".to_string()),
            other => other,
        })?
        .ok_or_else(|| HubError::NotFound("User".to_string()))?;

    info!("User {} updated their profile", user.id);

    Ok(Json(UpdateProfileResponse {
        message: "Profile updated successfully",
        user: user.into(),
    }))
}

/// PUT /users/change-password
///
/// Tokens issued before the change stay valid until they expire.
pub async fn change_password(
    State(state): State<HubState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    replace_password(&state, auth.user_id, req)
        .await
        .map_err(ApiError::on_server_error("Server error changing password"))?;

    info!("User {} changed their password", auth.user_id);

    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

async fn replace_password(state: &HubState, user_id: UserId, req: ChangePasswordRequest) -> HubResult<()> {
    if req.current_password.is_empty() {
        return Err(HubError::Validation("Current password is required".to_string()));
    }
    check_password(&req.new_password)?;

    let user = state
        .users
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| HubError::NotFound("User".to_string()))?;

    if !password_matches(req.current_password, user.password_hash).await? {
        return Err(HubError::Unauthorized("Current password is incorrect".to_string()));
    }

    let password_hash = hash_password(req.new_password).await?;
    if !state.users.update_password(user.id, &password_hash).await? {
        return Err(HubError::NotFound("User".to_string()));
    }
    Ok(())
}
