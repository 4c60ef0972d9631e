use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Request, State, ws::WebSocketUpgrade},
    middleware,
    response::{IntoResponse, Response},
    routing::{MethodRouter, get, post, put},
};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;

use super::HubState;
use super::middleware::auth_middleware;
use super::rate_limit::{RateLimiter, rate_limit_middleware};
use super::{auth, leaderboard, scores, users};
use crate::ws_server::websocket_handler;

/// Login/register attempts allowed per client per window
const AUTH_RATE_LIMIT: usize = 20;
const AUTH_RATE_WINDOW: Duration = Duration::from_secs(60);

pub fn build_router(state: HubState, web_dir: Option<&str>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let auth_limiter = RateLimiter::new(AUTH_RATE_LIMIT, AUTH_RATE_WINDOW);
    auth_limiter.spawn_cleanup(state.cancellation_token.clone());

    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .layer(middleware::from_fn_with_state(auth_limiter, rate_limit_middleware));

    let protected_routes = Router::new()
        .route("/scores/:game_id", post(scores::submit_score))
        .route("/users/profile", get(users::get_profile).put(users::update_profile))
        .route("/users/change-password", put(users::change_password))
        .layer(middleware::from_fn_with_state(
            state.authenticator.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/leaderboard/:game_id", get(leaderboard::get_leaderboard))
        .route("/leaderboard/:game_id/recent", get(leaderboard::get_recent_winners))
        .route("/ws", get(websocket_handler))
        .merge(auth_routes)
        .merge(protected_routes);

    // The API stays at the root next to the static files; unknown paths fall
    // through to the front end.
    let app = match web_dir {
        Some(dir) => {
            let index = ServeFile::new(format!("{}/index.html", dir));
            let serve_dir = ServeDir::new(dir).fallback(index.clone());
            info!("Serving static files from: {}", dir);

            api_routes
                .route("/", live_or_index(index))
                .fallback_service(serve_dir)
        }
        None => api_routes.route("/", get(websocket_handler)),
    };

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already-bound listener until the state's cancellation token fires.
pub async fn serve(listener: TcpListener, state: HubState, web_dir: Option<&str>) -> Result<()> {
    let cancellation_token = state.cancellation_token.clone();
    let app = build_router(state, web_dir);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancellation_token.cancelled().await;
            info!("HTTP server received shutdown signal");
        })
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))
}

pub async fn run_api_server(addr: &str, state: HubState, web_dir: Option<&str>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", addr))?;
    info!("HTTP server (API + WebSocket) listening on {}", addr);

    serve(listener, state, web_dir).await
}

async fn health_check() -> &'static str {
    "OK"
}

/// `/` is both the front-end entry point and a live update endpoint.
fn live_or_index(index: ServeFile) -> MethodRouter<HubState> {
    get(
        move |ws: Option<WebSocketUpgrade>, state: State<HubState>, request: Request| {
            let index = index.clone();
            async move {
                match ws {
                    Some(ws) => websocket_handler(ws, state).await.into_response(),
                    None => serve_index(index, request).await,
                }
            }
        },
    )
}

async fn serve_index(index: ServeFile, request: Request) -> Response {
    match index.oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
