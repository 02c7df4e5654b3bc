use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Persisted counters for one user, stored positionally as
/// `[session_points, overall_points, wins]`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreRecordEntity(pub u32, pub u32, pub u32);

/// Flat user -> counters mapping written to the scores file.
pub type ScoreTableEntity = IndexMap<String, ScoreRecordEntity>;

/// Decode a raw scores document, replacing malformed user entries with a zero record.
pub fn score_table_from_value(raw: IndexMap<String, Value>) -> ScoreTableEntity {
    raw.into_iter()
        .map(|(user, value)| {
            let record = serde_json::from_value::<ScoreRecordEntity>(value).unwrap_or_else(|err| {
                warn!(%user, error = %err, "malformed score record; starting from zero");
                ScoreRecordEntity::default()
            });
            (user, record)
        })
        .collect()
}

/// Question row as stored inside a backup snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Position of the question inside the loaded bank.
    pub bank_index: usize,
    /// Category shown between brackets when the question is asked.
    pub category: String,
    /// Question text.
    pub prompt: String,
    /// Accepted answers, the first one being the canonical answer.
    pub answers: Vec<String>,
    /// Free-form grouping tag carried over from the bank.
    #[serde(default)]
    pub grouping: Option<String>,
}

/// Key/value part of a backup snapshot describing the round position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundEntity {
    /// Index of the next question to ask once resumed.
    pub question_index: usize,
    /// Points awarded per correct answer.
    pub point_value: u32,
    /// Whether the bonus mode was active.
    pub bonus: bool,
}

/// Full backup document: round position, quiz set and score ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupEntity {
    /// RFC 3339 timestamp of the snapshot, informational only.
    pub saved_at: String,
    /// Round position.
    pub round: RoundEntity,
    /// Questions selected for the round, in play order.
    pub quiz_set: Vec<QuestionEntity>,
    /// Copy of the score ledger at snapshot time.
    pub scores: ScoreTableEntity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_record_serializes_as_flat_array() {
        let mut table = ScoreTableEntity::new();
        table.insert("alice".into(), ScoreRecordEntity(1, 5, 2));
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"alice":[1,5,2]}"#);
    }

    #[test]
    fn malformed_entries_recover_as_zero() {
        let raw: IndexMap<String, Value> =
            serde_json::from_str(r#"{"alice":[1,5,2],"bob":"oops","carol":[0,3]}"#).unwrap();
        let table = score_table_from_value(raw);

        assert_eq!(table["alice"], ScoreRecordEntity(1, 5, 2));
        assert_eq!(table["bob"], ScoreRecordEntity::default());
        assert_eq!(table["carol"], ScoreRecordEntity::default());
        assert_eq!(
            table.keys().collect::<Vec<_>>(),
            vec!["alice", "bob", "carol"]
        );
    }
}
