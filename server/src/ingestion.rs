use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{info, warn};

use common::{GameId, LiveMessage};

use crate::db::ScoreStore;
use crate::db::models::{NewScore, ScoreRecord, UserId};
use crate::error::{HubError, HubResult};
use crate::notifier::Notifier;

/// Accepts a score that denotes a whole number `>= 0`: an integral JSON
/// number (`50`, `50.0`) or a decimal string (`"50"`).
pub fn validate_score(raw: &JsonValue) -> HubResult<i64> {
    let score = match raw {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        JsonValue::String(s) => s.parse::<i64>().ok(),
        _ => None,
    };
    match score {
        Some(score) if score >= 0 => Ok(score),
        _ => Err(HubError::Validation("Score must be a non-negative integer".to_string())),
    }
}

fn integral(value: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which no longer fits
    (value.fract() == 0.0 && value.abs() < i64::MAX as f64).then_some(value as i64)
}

/// Validates, records and announces new scores.
#[derive(Clone)]
pub struct ScoreIngestion {
    store: Arc<dyn ScoreStore>,
    notifier: Arc<dyn Notifier>,
}

impl ScoreIngestion {
    pub fn new(store: Arc<dyn ScoreStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// `user_id` must already be authenticated. Every valid submission is
    /// stored, including ones below the user's current best.
    pub async fn submit(&self, user_id: UserId, game: &str, raw_score: &JsonValue) -> HubResult<ScoreRecord> {
        let game_id: GameId = game.parse()?;
        let score = validate_score(raw_score)?;

        let record = self
            .store
            .append_score(NewScore {
                user_id,
                game_id,
                score,
                created_at: Utc::now(),
            })
            .await?;

        info!("User {} scored {} in {}", user_id, record.score, record.game_id);

        // Publish strictly after the append. Failures here never fail the submission.
        if let Err(e) = self.notifier.publish(LiveMessage::score_update(game_id)).await {
            warn!("Failed to announce score {} for {}: {:#}", record.id, game_id, e);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDatabase;
    use crate::db::ScoreStore as _;
    use crate::notifier::{LocalNotifier, SubscriberId, Subscription};
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn subscribe(&self) -> Subscription {
            unimplemented!("not used by ingestion")
        }

        async fn unsubscribe(&self, _id: SubscriberId) {}

        async fn publish(&self, _message: LiveMessage) -> Result<()> {
            Err(anyhow::anyhow!("broker unavailable"))
        }
    }

    #[test]
    fn score_validation() {
        assert_eq!(validate_score(&json!(0)).unwrap(), 0);
        assert_eq!(validate_score(&json!(1234)).unwrap(), 1234);
        assert_eq!(validate_score(&json!(50.0)).unwrap(), 50);
        assert_eq!(validate_score(&json!("50")).unwrap(), 50);
        assert_eq!(validate_score(&json!("0")).unwrap(), 0);
        for bad in [
            json!(-1),
            json!(-3.0),
            json!(2.5),
            json!("-12"),
            json!("50.5"),
            json!("fifty"),
            json!(""),
            json!(null),
            json!(true),
            json!([1]),
            json!(u64::MAX),
            json!(1e300),
        ] {
            assert!(matches!(validate_score(&bad), Err(HubError::Validation(_))), "{bad}");
        }
    }

    #[tokio::test]
    async fn submit_records_and_notifies_once() {
        let db = Arc::new(InMemoryDatabase::new());
        let notifier = Arc::new(LocalNotifier::new());
        let mut viewer = notifier.subscribe().await;
        let ingestion = ScoreIngestion::new(db.clone(), notifier.clone());

        let record = ingestion.submit(3, "snake", &json!(42)).await.unwrap();
        assert_eq!((record.user_id, record.game_id, record.score), (3, GameId::Snake, 42));
        assert_eq!(db.scores_for_game(GameId::Snake).await.unwrap(), vec![record]);

        assert_eq!(viewer.recv().await, Some(LiveMessage::score_update(GameId::Snake)));
        assert!(viewer.try_recv().is_none());
    }

    #[tokio::test]
    async fn lower_scores_are_still_recorded() {
        let db = Arc::new(InMemoryDatabase::new());
        let ingestion = ScoreIngestion::new(db.clone(), Arc::new(LocalNotifier::new()));
        ingestion.submit(1, "quiz", &json!(90)).await.unwrap();
        ingestion.submit(1, "quiz", &json!(10)).await.unwrap();
        ingestion.submit(1, "quiz", &json!(90)).await.unwrap();
        assert_eq!(db.scores_for_game(GameId::Quiz).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rejected_submissions_leave_no_trace() {
        let db = Arc::new(InMemoryDatabase::new());
        let notifier = Arc::new(LocalNotifier::new());
        let mut viewer = notifier.subscribe().await;
        let ingestion = ScoreIngestion::new(db.clone(), notifier.clone());

        assert!(matches!(
            ingestion.submit(1, "snake", &json!(-5)).await,
            Err(HubError::Validation(_))
        ));
        assert!(matches!(
            ingestion.submit(1, "snake", &json!(7.5)).await,
            Err(HubError::Validation(_))
        ));
        assert!(matches!(
            ingestion.submit(1, "pinball", &json!(5)).await,
            Err(HubError::InvalidGameId(_))
        ));

        assert!(db.scores_for_user(1).await.unwrap().is_empty());
        assert!(viewer.try_recv().is_none());
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_submission() {
        let db = Arc::new(InMemoryDatabase::new());
        let ingestion = ScoreIngestion::new(db.clone(), Arc::new(FailingNotifier));
        let record = ingestion.submit(1, "tictactoe", &json!(1)).await.unwrap();
        assert_eq!(db.scores_for_user(1).await.unwrap(), vec![record]);
    }
}
