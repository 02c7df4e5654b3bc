//! Per-user score counters and leaderboards.
//!
//! Every mutation writes the full table through the [`TriviaStore`] before
//! returning. A failed write is logged and the in-memory table stays
//! authoritative.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{error, info};

use crate::dao::{
    models::{ScoreRecordEntity, ScoreTableEntity},
    storage::StorageResult,
    trivia_store::TriviaStore,
};

/// Score counters for a single user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserScoreRecord {
    /// Points earned in the current round.
    pub session_points: u32,
    /// Points earned across every round.
    pub overall_points: u32,
    /// Rounds won.
    pub wins: u32,
}

/// Leaderboard line for the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStanding {
    /// User identity.
    pub user: String,
    /// Session points.
    pub points: u32,
}

/// Leaderboard line across every round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverallStanding {
    /// User identity.
    pub user: String,
    /// Rounds won.
    pub wins: u32,
    /// Lifetime points.
    pub points: u32,
}

/// Score table keyed by user identity, in first-seen order.
pub struct ScoreLedger {
    records: IndexMap<String, UserScoreRecord>,
    store: Arc<dyn TriviaStore>,
}

impl ScoreLedger {
    /// Empty ledger writing through `store`.
    pub fn new(store: Arc<dyn TriviaStore>) -> Self {
        Self {
            records: IndexMap::new(),
            store,
        }
    }

    /// Load the persisted table; a store with no table yields an empty ledger.
    pub async fn load(store: Arc<dyn TriviaStore>) -> StorageResult<Self> {
        let records = match store.load_scores().await? {
            Some(table) => {
                info!(users = table.len(), "score list loaded");
                records_from_entity(table)
            }
            None => {
                info!("no score list yet; starting empty");
                IndexMap::new()
            }
        };
        Ok(Self { records, store })
    }

    /// Counters for `user`, or `None` if the user never scored.
    pub fn get(&self, user: &str) -> Option<UserScoreRecord> {
        self.records.get(user).copied()
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no user is known.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add `points` to the session and overall counters of `user`, creating the record if needed.
    pub async fn credit(&mut self, user: &str, points: u32) -> UserScoreRecord {
        let record = self.records.entry(user.to_owned()).or_default();
        record.session_points = record.session_points.saturating_add(points);
        record.overall_points = record.overall_points.saturating_add(points);
        let updated = *record;
        self.persist().await;
        updated
    }

    /// Count one more round won by `user`.
    pub async fn record_win(&mut self, user: &str) -> UserScoreRecord {
        let record = self.records.entry(user.to_owned()).or_default();
        record.wins = record.wins.saturating_add(1);
        let updated = *record;
        self.persist().await;
        updated
    }

    /// Zero the session counter of every user.
    pub async fn reset_session(&mut self) {
        for record in self.records.values_mut() {
            record.session_points = 0;
        }
        self.persist().await;
    }

    /// Up to `n` users with session points, highest first.
    ///
    /// Ties keep first-seen order; there is no secondary key.
    pub fn top_session(&self, n: usize) -> Vec<SessionStanding> {
        let mut standings: Vec<SessionStanding> = self
            .records
            .iter()
            .filter(|(_, record)| record.session_points > 0)
            .map(|(user, record)| SessionStanding {
                user: user.clone(),
                points: record.session_points,
            })
            .collect();
        standings.sort_by(|a, b| b.points.cmp(&a.points));
        standings.truncate(n);
        standings
    }

    /// Up to `n` users ranked by wins, then lifetime points.
    pub fn top_overall(&self, n: usize) -> Vec<OverallStanding> {
        let mut standings: Vec<OverallStanding> = self
            .records
            .iter()
            .map(|(user, record)| OverallStanding {
                user: user.clone(),
                wins: record.wins,
                points: record.overall_points,
            })
            .collect();
        standings.sort_by(|a, b| (b.wins, b.points).cmp(&(a.wins, a.points)));
        standings.truncate(n);
        standings
    }

    /// Persisted representation of the table.
    pub fn to_entity(&self) -> ScoreTableEntity {
        self.records
            .iter()
            .map(|(user, record)| (user.clone(), (*record).into()))
            .collect()
    }

    /// Replace the whole table, as done when resuming from a backup.
    pub async fn restore(&mut self, table: ScoreTableEntity) {
        self.records = records_from_entity(table);
        self.persist().await;
    }

    /// Write the table to the store, returning whether the write succeeded.
    pub async fn persist(&self) -> bool {
        match self.store.save_scores(self.to_entity()).await {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "scores NOT saved");
                false
            }
        }
    }
}

fn records_from_entity(table: ScoreTableEntity) -> IndexMap<String, UserScoreRecord> {
    table
        .into_iter()
        .map(|(user, record)| (user, record.into()))
        .collect()
}

impl From<ScoreRecordEntity> for UserScoreRecord {
    fn from(ScoreRecordEntity(session_points, overall_points, wins): ScoreRecordEntity) -> Self {
        Self {
            session_points,
            overall_points,
            wins,
        }
    }
}

impl From<UserScoreRecord> for ScoreRecordEntity {
    fn from(value: UserScoreRecord) -> Self {
        Self(value.session_points, value.overall_points, value.wins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::trivia_store::InMemoryStore;

    fn ledger() -> (ScoreLedger, InMemoryStore) {
        let store = InMemoryStore::new();
        (ScoreLedger::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn credits_accumulate_and_persist() {
        let (mut ledger, store) = ledger();
        for _ in 0..4 {
            ledger.credit("alice", 3).await;
        }

        let record = ledger.get("alice").unwrap();
        assert_eq!(record.session_points, 12);
        assert_eq!(record.overall_points, 12);
        assert_eq!(store.score_writes(), 4);
        assert_eq!(store.scores().unwrap()["alice"], ScoreRecordEntity(12, 12, 0));
    }

    #[tokio::test]
    async fn unknown_users_are_not_found() {
        let (ledger, _) = ledger();
        assert!(ledger.get("nobody").is_none());
        assert!(ledger.top_overall(3).is_empty());
    }

    #[tokio::test]
    async fn failed_writes_keep_memory_state() {
        let (mut ledger, store) = ledger();
        store.fail_writes(true);
        ledger.credit("bob", 1).await;

        assert_eq!(ledger.get("bob").unwrap().session_points, 1);
        assert!(store.scores().is_none());
        assert!(!ledger.persist().await);
    }

    #[tokio::test]
    async fn session_ranking_skips_zero_and_keeps_insertion_order_on_ties() {
        let (mut ledger, _) = ledger();
        ledger.credit("carol", 2).await;
        ledger.credit("alice", 2).await;
        ledger.credit("bob", 5).await;
        ledger.record_win("dave").await;

        let top = ledger.top_session(3);
        let names: Vec<_> = top.iter().map(|s| s.user.as_str()).collect();
        assert_eq!(names, vec!["bob", "carol", "alice"]);
        assert!(ledger.top_session(10).iter().all(|s| s.user != "dave"));
    }

    #[tokio::test]
    async fn overall_ranking_puts_wins_before_points() {
        let (mut ledger, _) = ledger();
        ledger.credit("grinder", 50).await;
        ledger.credit("champ", 3).await;
        ledger.record_win("champ").await;

        let top = ledger.top_overall(3);
        assert_eq!(top[0].user, "champ");
        assert_eq!(top[0].wins, 1);
        assert_eq!(top[1].user, "grinder");
        assert_eq!(top[1].points, 50);
    }

    #[tokio::test]
    async fn reset_session_keeps_lifetime_counters() {
        let (mut ledger, _) = ledger();
        ledger.credit("alice", 2).await;
        ledger.record_win("alice").await;
        ledger.reset_session().await;

        assert_eq!(
            ledger.get("alice").unwrap(),
            UserScoreRecord {
                session_points: 0,
                overall_points: 2,
                wins: 1,
            }
        );
        assert!(ledger.top_session(3).is_empty());
    }

    #[tokio::test]
    async fn load_reads_the_stored_table_in_order() {
        let mut table = ScoreTableEntity::new();
        table.insert("zoe".into(), ScoreRecordEntity(0, 7, 1));
        table.insert("adam".into(), ScoreRecordEntity(0, 7, 1));
        let store = InMemoryStore::with_scores(table);

        let ledger = ScoreLedger::load(Arc::new(store)).await.unwrap();
        let names: Vec<_> = ledger.top_overall(3).into_iter().map(|s| s.user).collect();
        assert_eq!(names, vec!["zoe", "adam"]);
        assert_eq!(ledger.len(), 2);
    }
}
