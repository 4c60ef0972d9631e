use anyhow::Result;
use async_trait::async_trait;
use gamehub::api::jwt::{AuthenticatedUser, Authenticator};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Authenticator that only knows the tokens a test handed out.
#[derive(Default)]
pub struct MockAuthenticator {
    tokens: RwLock<HashMap<String, AuthenticatedUser>>,
}

impl MockAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn allow(&self, token: &str, user: AuthenticatedUser) {
        self.tokens.write().await.insert(token.to_string(), user);
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser> {
        self.tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Invalid token"))
    }
}
