//! Round snapshots written after scoring events and restored on demand.

use std::sync::Arc;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::info;

use crate::{
    dao::{
        models::{BackupEntity, RoundEntity, ScoreTableEntity},
        storage::StorageResult,
        trivia_store::TriviaStore,
    },
    error::EngineError,
    state::round::{QuizSet, RoundState},
};

/// Round data recovered from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredRound {
    /// Position, point value and bonus flag; timing context is always fresh.
    pub round: RoundState,
    /// Questions of the interrupted round.
    pub quiz: QuizSet,
    /// Score table at snapshot time.
    pub scores: ScoreTableEntity,
}

/// Writes, reads and discards the backup snapshot.
#[derive(Clone)]
pub struct BackupRecovery {
    store: Arc<dyn TriviaStore>,
}

impl BackupRecovery {
    /// Snapshot handler writing through `store`.
    pub fn new(store: Arc<dyn TriviaStore>) -> Self {
        Self { store }
    }

    /// Replace the snapshot with the given round position, quiz set and scores.
    pub async fn save(
        &self,
        round: RoundEntity,
        quiz: &QuizSet,
        scores: ScoreTableEntity,
    ) -> StorageResult<()> {
        let backup = BackupEntity {
            saved_at: now_rfc3339(),
            round,
            quiz_set: quiz.clone().into(),
            scores,
        };
        self.store.save_backup(backup).await?;
        info!(
            question_index = round.question_index,
            point_value = round.point_value,
            bonus = round.bonus,
            "trivia backup written"
        );
        Ok(())
    }

    /// Read and validate the snapshot.
    pub async fn load(&self) -> Result<RestoredRound, EngineError> {
        let backup = self.store.load_backup().await?.ok_or(EngineError::NoBackup)?;

        if backup.quiz_set.is_empty() {
            return Err(EngineError::CorruptBackup("quiz set is empty".into()));
        }
        if backup.round.question_index > backup.quiz_set.len() {
            return Err(EngineError::CorruptBackup(format!(
                "question index {} is past the {} saved questions",
                backup.round.question_index,
                backup.quiz_set.len()
            )));
        }
        if backup.quiz_set.iter().any(|q| q.answers.is_empty()) {
            return Err(EngineError::CorruptBackup(
                "a saved question has no answer".into(),
            ));
        }

        Ok(RestoredRound {
            round: backup.round.into(),
            quiz: backup.quiz_set.into(),
            scores: backup.scores,
        })
    }

    /// Delete the snapshot after a clean round completion.
    pub async fn discard(&self) -> StorageResult<()> {
        self.store.delete_backup().await
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{
            models::{QuestionEntity, ScoreRecordEntity},
            trivia_store::InMemoryStore,
        },
        state::round::Question,
    };

    fn quiz() -> QuizSet {
        QuizSet::new(vec![
            Question {
                bank_index: 4,
                category: "Zelda".into(),
                prompt: "Name of the hero?".into(),
                accepted_answers: vec!["Link".into()],
                grouping: None,
            },
            Question {
                bank_index: 1,
                category: "Mario".into(),
                prompt: "Brother of Mario?".into(),
                accepted_answers: vec!["Luigi".into(), "Weegee".into()],
                grouping: Some("Nintendo".into()),
            },
        ])
    }

    #[tokio::test]
    async fn snapshot_round_trips() {
        let store = InMemoryStore::new();
        let backups = BackupRecovery::new(Arc::new(store.clone()));
        let mut scores = ScoreTableEntity::new();
        scores.insert("alice".into(), ScoreRecordEntity(1, 9, 2));
        let round = RoundEntity {
            question_index: 1,
            point_value: 5,
            bonus: true,
        };

        backups.save(round, &quiz(), scores.clone()).await.unwrap();
        let restored = backups.load().await.unwrap();

        assert_eq!(restored.quiz, quiz());
        assert_eq!(restored.scores, scores);
        assert_eq!(restored.round.current_question_index, 1);
        assert_eq!(restored.round.current_point_value, 5);
        assert!(restored.round.bonus);
        assert!(restored.round.question_asked_at.is_none());
    }

    #[tokio::test]
    async fn missing_snapshot_is_reported() {
        let backups = BackupRecovery::new(Arc::new(InMemoryStore::new()));
        assert!(matches!(backups.load().await, Err(EngineError::NoBackup)));
    }

    #[tokio::test]
    async fn out_of_range_index_is_corrupt() {
        let store = InMemoryStore::new();
        store
            .save_backup(BackupEntity {
                saved_at: String::new(),
                round: RoundEntity {
                    question_index: 3,
                    point_value: 1,
                    bonus: false,
                },
                quiz_set: vec![QuestionEntity {
                    bank_index: 0,
                    category: "c".into(),
                    prompt: "p".into(),
                    answers: vec!["a".into()],
                    grouping: None,
                }],
                scores: ScoreTableEntity::new(),
            })
            .await
            .unwrap();

        let backups = BackupRecovery::new(Arc::new(store));
        match backups.load().await {
            Err(EngineError::CorruptBackup(reason)) => assert!(reason.contains("index 3")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn discard_removes_snapshot() {
        let store = InMemoryStore::new();
        let backups = BackupRecovery::new(Arc::new(store.clone()));
        backups
            .save(
                RoundEntity {
                    question_index: 0,
                    point_value: 1,
                    bonus: false,
                },
                &quiz(),
                ScoreTableEntity::new(),
            )
            .await
            .unwrap();
        backups.discard().await.unwrap();
        assert!(store.backup().is_none());
    }
}
