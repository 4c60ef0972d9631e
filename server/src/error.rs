use thiserror::Error;

use crate::db::UsernameTaken;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Invalid game ID")]
    InvalidGameId(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Persistence or other infrastructure failure. Details are for logs only.
    #[error("store failure: {0:#}")]
    Store(anyhow::Error),
}

pub type HubResult<T> = std::result::Result<T, HubError>;

impl From<anyhow::Error> for HubError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<UsernameTaken>() {
            Some(taken) => HubError::Conflict(taken.to_string()),
            None => HubError::Store(err),
        }
    }
}

impl From<common::UnknownGameId> for HubError {
    fn from(err: common::UnknownGameId) -> Self {
        HubError::InvalidGameId(err.0)
    }
}
