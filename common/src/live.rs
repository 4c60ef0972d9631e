use serde::{Deserialize, Serialize};

use crate::GameId;

/// Messages pushed to live leaderboard viewers.
///
/// A `ScoreUpdate` carries no score data: it only says that the leaderboard
/// for `game_id` may have changed, and viewers are expected to re-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LiveMessage {
    #[serde(rename = "scoreUpdate")]
    ScoreUpdate {
        #[serde(rename = "gameId")]
        game_id: GameId,
    },
}

impl LiveMessage {
    pub fn score_update(game_id: GameId) -> Self {
        LiveMessage::ScoreUpdate { game_id }
    }

    pub fn game_id(&self) -> GameId {
        match self {
            LiveMessage::ScoreUpdate { game_id } => *game_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_update_wire_shape() {
        let msg = LiveMessage::score_update(GameId::Snake);
        let value = serde_json::to_value(msg).unwrap();
        assert_eq!(value, serde_json::json!({ "type": "scoreUpdate", "gameId": "snake" }));
    }

    #[test]
    fn parses_client_side_shape() {
        let msg: LiveMessage =
            serde_json::from_str(r#"{"gameId":"tictactoe","type":"scoreUpdate"}"#).unwrap();
        assert_eq!(msg.game_id(), GameId::TicTacToe);
    }
}
