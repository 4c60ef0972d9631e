use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::HubState;
use super::error::ApiError;
use super::jwt::AuthenticatedUser;
use crate::db::models::ScoreRecord;

#[derive(Debug, Serialize)]
pub struct SubmitScoreResponse {
    pub message: &'static str,
    pub score: ScoreRecord,
}

/// POST /scores/:game_id with body `{ "score": <integer> }`
///
/// The body is taken as loose JSON: `50.0` and `"50"` are accepted, and a
/// malformed score is reported as a validation error instead of a
/// deserialization rejection.
pub async fn submit_score(
    State(state): State<HubState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(game_id): Path<String>,
    Json(body): Json<JsonValue>,
) -> Result<(StatusCode, Json<SubmitScoreResponse>), ApiError> {
    let raw_score = body.get("score").unwrap_or(&JsonValue::Null);

    let record = state
        .ingestion
        .submit(user.user_id, &game_id, raw_score)
        .await
        .map_err(ApiError::on_server_error("Server error submitting score"))?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitScoreResponse {
            message: "Score submitted successfully",
            score: record,
        }),
    ))
}
