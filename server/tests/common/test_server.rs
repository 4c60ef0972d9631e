use anyhow::Result;
use gamehub::api::jwt::{AuthenticatedUser, Authenticator, JwtManager};
use gamehub::api::{HubState, serve};
use gamehub::db::models::UserId;
use gamehub::db::{InMemoryDatabase, UserStore};
use gamehub::notifier::LocalNotifier;
use reqwest::{Response, StatusCode};
use serde_json::Value as JsonValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::mock_auth::MockAuthenticator;

pub const TEST_JWT_SECRET: &str = "test-secret";

/// A user that exists in the store and holds a token the server accepts.
#[derive(Debug, Clone)]
pub struct Player {
    pub user_id: UserId,
    pub username: String,
    pub token: String,
}

/// A hub running on an ephemeral port with in-memory storage.
pub struct TestServer {
    pub addr: SocketAddr,
    pub db: Arc<InMemoryDatabase>,
    pub notifier: Arc<LocalNotifier>,
    pub mock_auth: Arc<MockAuthenticator>,
    pub http: reqwest::Client,
    cancellation_token: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    /// Bearer tokens are checked by a [`MockAuthenticator`]; use
    /// [`TestServer::create_player`] to get one.
    pub async fn start() -> Result<Self> {
        let mock_auth = Arc::new(MockAuthenticator::new());
        Self::start_with(mock_auth.clone(), mock_auth, None).await
    }

    /// Also serves the front end from `web_dir`, as `GAMEHUB_WEB_DIR` does.
    pub async fn start_with_web_dir(web_dir: &str) -> Result<Self> {
        let mock_auth = Arc::new(MockAuthenticator::new());
        Self::start_with(mock_auth.clone(), mock_auth, Some(web_dir.to_string())).await
    }

    /// Bearer tokens are real JWTs, as issued by `/auth/register` and `/auth/login`.
    pub async fn start_with_jwt() -> Result<Self> {
        let authenticator = Arc::new(JwtManager::new(TEST_JWT_SECRET));
        Self::start_with(authenticator, Arc::new(MockAuthenticator::new()), None).await
    }

    async fn start_with(
        authenticator: Arc<dyn Authenticator>,
        mock_auth: Arc<MockAuthenticator>,
        web_dir: Option<String>,
    ) -> Result<Self> {
        let _ = tracing_subscriber::fmt::try_init();

        let db = Arc::new(InMemoryDatabase::new());
        let notifier = Arc::new(LocalNotifier::new());
        let cancellation_token = CancellationToken::new();

        let state = HubState::new(
            db.clone(),
            db.clone(),
            notifier.clone(),
            Arc::new(JwtManager::new(TEST_JWT_SECRET)),
            authenticator,
            cancellation_token.clone(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move { serve(listener, state, web_dir.as_deref()).await });
        info!("Test server listening on {}", addr);

        Ok(Self {
            addr,
            db,
            notifier,
            mock_auth,
            http: reqwest::Client::new(),
            cancellation_token,
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Browsers opened on the front end connect to the bare origin.
    pub fn root_ws_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Creates the user directly in the store and authorizes a token for it.
    pub async fn create_player(&self, username: &str) -> Result<Player> {
        let user = self.db.create_user(username, "not-a-real-hash", None).await?;
        let token = format!("token-{}", user.id);
        self.mock_auth
            .allow(
                &token,
                AuthenticatedUser {
                    user_id: user.id,
                    username: user.username.clone(),
                },
            )
            .await;

        Ok(Player {
            user_id: user.id,
            username: user.username,
            token,
        })
    }

    pub async fn submit_score(&self, token: &str, game: &str, body: JsonValue) -> Result<Response> {
        Ok(self
            .http
            .post(self.url(&format!("/scores/{}", game)))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?)
    }

    /// Submits `{ "score": score }` and requires a 201.
    pub async fn submit_ok(&self, player: &Player, game: &str, score: i64) -> Result<JsonValue> {
        let response = self
            .submit_score(&player.token, game, serde_json::json!({ "score": score }))
            .await?;
        let status = response.status();
        let body: JsonValue = response.json().await?;
        if status != StatusCode::CREATED {
            return Err(anyhow::anyhow!("Submission failed with {}: {}", status, body));
        }
        Ok(body)
    }

    pub async fn get_json(&self, path: &str) -> Result<(StatusCode, JsonValue)> {
        let response = self.http.get(self.url(path)).send().await?;
        let status = response.status();
        Ok((status, response.json().await?))
    }

    /// Live viewers register asynchronously after the upgrade completes.
    pub async fn wait_for_subscribers(&self, count: usize) -> Result<()> {
        for _ in 0..200 {
            if self.notifier.subscriber_count().await >= count {
                return Ok(());
            }
            sleep(Duration::from_millis(10)).await;
        }
        Err(anyhow::anyhow!("Expected {} live subscribers", count))
    }

    pub async fn shutdown(self) -> Result<()> {
        self.cancellation_token.cancel();
        self.handle.await??;
        Ok(())
    }
}
