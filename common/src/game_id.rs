use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The games hosted by the hub. Scores, leaderboards and live updates are
/// always scoped to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameId {
    #[serde(rename = "tictactoe")]
    TicTacToe,
    Snake,
    Quiz,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown game id: {0}")]
pub struct UnknownGameId(pub String);

impl GameId {
    pub const ALL: [GameId; 3] = [GameId::TicTacToe, GameId::Snake, GameId::Quiz];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameId::TicTacToe => "tictactoe",
            GameId::Snake => "snake",
            GameId::Quiz => "quiz",
        }
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Exact match only: "Snake" or " snake" are not game ids.
impl FromStr for GameId {
    type Err = UnknownGameId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameId::ALL
            .into_iter()
            .find(|game| game.as_str() == s)
            .ok_or_else(|| UnknownGameId(s.to_string()))
    }
}
