//! Leaderboard and recent-activity views computed from the score log.
//!
//! Rankings are recomputed from the raw records on every query. The reduction
//! from records to per-user best scores lives in [`rank_best_scores`], a pure
//! function, so it can be swapped for an incrementally maintained index
//! without touching the query contract.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use common::{
    DEFAULT_LEADERBOARD_PAGE_SIZE, DEFAULT_RECENT_WINNERS_LIMIT, GameId,
    MAX_LEADERBOARD_PAGE_SIZE, MAX_RECENT_WINNERS_LIMIT, UNKNOWN_USERNAME,
};

use crate::db::models::{ScoreRecord, UserId, UserProfile};
use crate::db::{ScoreStore, UserStore};
use crate::error::HubResult;

/// A user's single best play in one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestScore {
    pub user_id: UserId,
    pub score: i64,
    pub achieved_at: DateTime<Utc>,
    pub record_id: i64,
}

impl BestScore {
    fn from_record(record: &ScoreRecord) -> Self {
        Self {
            user_id: record.user_id,
            score: record.score,
            achieved_at: record.created_at,
            record_id: record.id,
        }
    }

    /// Higher score first; on equal scores the earlier achievement wins.
    fn outranks(&self, other: &BestScore) -> bool {
        self.score > other.score
            || (self.score == other.score
                && (self.achieved_at, self.record_id) < (other.achieved_at, other.record_id))
    }
}

/// Reduces a game's records to one best score per user and orders them by
/// rank. Position `i` in the result holds rank `i + 1`.
///
/// Ties: a user's best is the earliest record carrying their maximum score;
/// between users with equal best scores, whoever reached it first ranks higher.
pub fn rank_best_scores<I>(records: I) -> Vec<BestScore>
where
    I: IntoIterator<Item = ScoreRecord>,
{
    let mut best: HashMap<UserId, BestScore> = HashMap::new();

    for record in records {
        let candidate = BestScore::from_record(&record);
        match best.get_mut(&record.user_id) {
            Some(current) if candidate.outranks(current) => *current = candidate,
            Some(_) => {}
            None => {
                best.insert(record.user_id, candidate);
            }
        }
    }

    let mut ranked: Vec<BestScore> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.achieved_at.cmp(&b.achieved_at))
            .then(a.record_id.cmp(&b.record_id))
    });
    ranked
}

/// Normalized 1-based pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    /// Missing or zero values fall back to page 1 and the default page size.
    pub fn new(page: Option<usize>, page_size: Option<usize>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let page_size = page_size
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_LEADERBOARD_PAGE_SIZE)
            .min(MAX_LEADERBOARD_PAGE_SIZE);
        Self { page, page_size }
    }

    fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub profile_picture: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardPage {
    #[serde(rename = "leaderboard")]
    pub entries: Vec<LeaderboardEntry>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentWinner {
    pub username: String,
    pub profile_picture: String,
    pub game_id: GameId,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

/// Clamps a recent-winners limit the same way [`PageRequest`] does page sizes.
pub fn recent_winners_limit(limit: Option<usize>) -> usize {
    limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_RECENT_WINNERS_LIMIT)
        .min(MAX_RECENT_WINNERS_LIMIT)
}

/// Read-only query service over the score log and user directory.
#[derive(Clone)]
pub struct Aggregator {
    scores: Arc<dyn ScoreStore>,
    users: Arc<dyn UserStore>,
}

impl Aggregator {
    pub fn new(scores: Arc<dyn ScoreStore>, users: Arc<dyn UserStore>) -> Self {
        Self { scores, users }
    }

    pub async fn leaderboard(&self, game: &str, request: PageRequest) -> HubResult<LeaderboardPage> {
        let game_id: GameId = game.parse()?;

        let records = self.scores.scores_for_game(game_id).await?;
        let ranked = rank_best_scores(records);
        let total_entries = ranked.len();

        let page: Vec<(usize, BestScore)> = ranked
            .into_iter()
            .enumerate()
            .skip(request.offset())
            .take(request.page_size)
            .collect();

        let user_ids: Vec<UserId> = page.iter().map(|(_, best)| best.user_id).collect();
        let profiles = self.profiles_for(&user_ids).await?;

        let entries = page
            .into_iter()
            .map(|(position, best)| {
                let (username, profile_picture) = display_for(&profiles, best.user_id);
                LeaderboardEntry {
                    rank: position + 1,
                    username,
                    profile_picture,
                    score: best.score,
                    created_at: best.achieved_at,
                }
            })
            .collect();

        Ok(LeaderboardPage {
            entries,
            pagination: Pagination {
                current_page: request.page,
                total_pages: total_entries.div_ceil(request.page_size),
                total_entries,
            },
        })
    }

    pub async fn recent_winners(&self, game: &str, limit: usize) -> HubResult<Vec<RecentWinner>> {
        let game_id: GameId = game.parse()?;

        let records = self.scores.recent_scores(game_id, limit).await?;
        let user_ids: Vec<UserId> = records.iter().map(|r| r.user_id).collect();
        let profiles = self.profiles_for(&user_ids).await?;

        Ok(records
            .into_iter()
            .map(|record| {
                let (username, profile_picture) = display_for(&profiles, record.user_id);
                RecentWinner {
                    username,
                    profile_picture,
                    game_id: record.game_id,
                    score: record.score,
                    created_at: record.created_at,
                }
            })
            .collect())
    }

    /// Best score per game for one user; games never played are absent.
    pub async fn best_scores_for_user(&self, user_id: UserId) -> HubResult<BTreeMap<GameId, i64>> {
        let records = self.scores.scores_for_user(user_id).await?;
        let mut best = BTreeMap::new();
        for record in records {
            best.entry(record.game_id)
                .and_modify(|score: &mut i64| *score = (*score).max(record.score))
                .or_insert(record.score);
        }
        Ok(best)
    }

    async fn profiles_for(&self, user_ids: &[UserId]) -> HubResult<HashMap<UserId, UserProfile>> {
        let mut unique = user_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        Ok(self.users.get_profiles(&unique).await?)
    }
}

fn display_for(profiles: &HashMap<UserId, UserProfile>, user_id: UserId) -> (String, String) {
    match profiles.get(&user_id) {
        Some(profile) => (
            profile.username.clone(),
            profile.profile_picture.clone().unwrap_or_default(),
        ),
        None => {
            debug!("User {} not found, using placeholder display name", user_id);
            (UNKNOWN_USERNAME.to_string(), String::new())
        }
    }
}
