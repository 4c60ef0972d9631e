use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;
use super::jwt::Authenticator;
use crate::error::HubError;

/// Requires `Authorization: Bearer <token>` and stores the verified
/// [`AuthenticatedUser`](super::jwt::AuthenticatedUser) in request extensions.
pub async fn auth_middleware(
    State(authenticator): State<Arc<dyn Authenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    let Some(token) = token else {
        return unauthorized("Missing or invalid authorization header");
    };

    match authenticator.verify(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            debug!("Rejected bearer token: {:#}", e);
            unauthorized("Invalid or expired token")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    ApiError::from(HubError::Unauthorized(message.to_string())).into_response()
}
