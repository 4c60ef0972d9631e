use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Sliding-window request limiter keyed by client address.
#[derive(Clone)]
pub struct RateLimiter {
    hits: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            hits: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Records the attempt and reports whether it fits in the window.
    pub async fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now()).await
    }

    async fn allow_at(&self, client: &str, now: Instant) -> bool {
        let mut hits = self.hits.lock().await;
        let recent = hits.entry(client.to_string()).or_default();

        while recent.front().is_some_and(|t| now.duration_since(*t) >= self.window) {
            recent.pop_front();
        }

        if recent.len() < self.max_requests {
            recent.push_back(now);
            true
        } else {
            warn!("Rate limit exceeded for client {}", client);
            false
        }
    }

    async fn forget_idle(&self) {
        let now = Instant::now();
        self.hits
            .lock()
            .await
            .retain(|_, recent| recent.back().is_some_and(|t| now.duration_since(*t) < self.window));
    }

    /// Periodically drops clients with no requests inside the window.
    pub fn spawn_cleanup(&self, cancellation_token: CancellationToken) {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = interval.tick() => limiter.forget_idle().await,
                }
            }
        });
    }
}

/// First hop of X-Forwarded-For, then X-Real-IP.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(request.headers());

    if !limiter.allow(&client).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many requests. Please try again later." })),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.allow_at("1.2.3.4", start).await);
        assert!(limiter.allow_at("1.2.3.4", start).await);
        assert!(!limiter.allow_at("1.2.3.4", start + Duration::from_secs(1)).await);
        assert!(limiter.allow_at("5.6.7.8", start).await);
        assert!(limiter.allow_at("1.2.3.4", start + Duration::from_secs(60)).await);
    }

    #[test]
    fn client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "unknown");
        headers.insert("x-real-ip", "10.0.0.9".parse().unwrap());
        assert_eq!(client_key(&headers), "10.0.0.9");
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_key(&headers), "203.0.113.7");
    }
}
