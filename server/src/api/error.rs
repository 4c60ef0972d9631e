use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use crate::error::HubError;

/// A [`HubError`] on its way out of an HTTP handler.
///
/// Infrastructure failures are logged here and replaced by `server_message`,
/// so nothing about the store reaches the client.
#[derive(Debug)]
pub struct ApiError {
    inner: HubError,
    server_message: &'static str,
}

impl ApiError {
    /// Adapter for `map_err` that picks the opaque 500 message for an endpoint.
    pub fn on_server_error(server_message: &'static str) -> impl FnOnce(HubError) -> ApiError {
        move |inner| ApiError { inner, server_message }
    }
}

impl From<HubError> for ApiError {
    fn from(inner: HubError) -> Self {
        Self {
            inner,
            server_message: "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.inner {
            HubError::InvalidGameId(game) => {
                warn!("Rejected unknown game id {:?}", game);
                (StatusCode::BAD_REQUEST, "Invalid game ID".to_string())
            }
            HubError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            HubError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            HubError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            HubError::Conflict(message) => (StatusCode::CONFLICT, message),
            HubError::Store(e) => {
                error!("{}: {:#}", self.server_message, e);
                (StatusCode::INTERNAL_SERVER_ERROR, self.server_message.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn status_and_body(err: ApiError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn invalid_game_id_is_a_bad_request() {
        let (status, body) = status_and_body(HubError::InvalidGameId("chess".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"Invalid game ID"}"#);
    }

    #[tokio::test]
    async fn store_failures_are_opaque() {
        let err = HubError::Store(anyhow::anyhow!("connection refused on 10.0.0.3:5432"));
        let (status, body) =
            status_and_body(ApiError::on_server_error("Server error fetching leaderboard")(err)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"Server error fetching leaderboard"}"#);
    }
}
