use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use super::HubState;
use super::error::ApiError;
use crate::aggregator::{LeaderboardPage, PageRequest, RecentWinner, recent_winners_limit};

/// Raw query values. Anything that is not a positive integer falls back to
/// the default rather than failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

fn parse_count(raw: &Option<String>) -> Option<usize> {
    raw.as_deref().and_then(|v| v.trim().parse::<usize>().ok())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentWinnersResponse {
    pub recent_winners: Vec<RecentWinner>,
}

/// GET /leaderboard/:game_id?page&limit
pub async fn get_leaderboard(
    State(state): State<HubState>,
    Path(game_id): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardPage>, ApiError> {
    let request = PageRequest::new(parse_count(&query.page), parse_count(&query.limit));

    let page = state
        .aggregator
        .leaderboard(&game_id, request)
        .await
        .map_err(ApiError::on_server_error("Server error fetching leaderboard"))?;

    Ok(Json(page))
}

/// GET /leaderboard/:game_id/recent?limit
pub async fn get_recent_winners(
    State(state): State<HubState>,
    Path(game_id): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<RecentWinnersResponse>, ApiError> {
    let limit = recent_winners_limit(parse_count(&query.limit));

    let recent_winners = state
        .aggregator
        .recent_winners(&game_id, limit)
        .await
        .map_err(ApiError::on_server_error("Server error fetching recent winners"))?;

    Ok(Json(RecentWinnersResponse { recent_winners }))
}
