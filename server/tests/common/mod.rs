#![allow(dead_code)]

pub mod mock_auth;
pub mod test_client;
pub mod test_server;

pub use mock_auth::MockAuthenticator;
pub use test_client::LiveClient;
pub use test_server::{Player, TestServer};

/// Macro to wrap test functions with a timeout to prevent hanging tests
#[macro_export]
macro_rules! timeout_test {
    ($duration:expr, $body:expr) => {
        tokio::time::timeout($duration, $body)
            .await
            .map_err(|_| anyhow::anyhow!("Test timed out after {:?}", $duration))?
    };
}
