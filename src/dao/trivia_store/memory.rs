//! Process-local store, used for dry runs and tests.

use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use futures::future::BoxFuture;

use crate::dao::{
    models::{BackupEntity, ScoreTableEntity},
    storage::{StorageError, StorageResult},
    trivia_store::TriviaStore,
};

#[derive(Debug, Default)]
struct Inner {
    scores: Mutex<Option<ScoreTableEntity>>,
    backup: Mutex<Option<BackupEntity>>,
    fail_writes: AtomicBool,
    score_writes: AtomicUsize,
}

/// Store keeping both documents in memory. Cloning shares the same documents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a score table.
    pub fn with_scores(scores: ScoreTableEntity) -> Self {
        let store = Self::default();
        *lock(&store.inner.scores) = Some(scores);
        store
    }

    /// Make every subsequent write fail with [`StorageError::Unavailable`].
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful score table writes so far.
    pub fn score_writes(&self) -> usize {
        self.inner.score_writes.load(Ordering::SeqCst)
    }

    /// Current score table, if any was written.
    pub fn scores(&self) -> Option<ScoreTableEntity> {
        lock(&self.inner.scores).clone()
    }

    /// Current backup snapshot, if any.
    pub fn backup(&self) -> Option<BackupEntity> {
        lock(&self.inner.backup).clone()
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "in-memory store is read-only".into(),
                io::Error::from(io::ErrorKind::PermissionDenied),
            ));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TriviaStore for InMemoryStore {
    fn load_scores(&self) -> BoxFuture<'static, StorageResult<Option<ScoreTableEntity>>> {
        let scores = self.scores();
        Box::pin(async move { Ok(scores) })
    }

    fn save_scores(&self, scores: ScoreTableEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_writable()?;
            *lock(&store.inner.scores) = Some(scores);
            store.inner.score_writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn load_backup(&self) -> BoxFuture<'static, StorageResult<Option<BackupEntity>>> {
        let backup = self.backup();
        Box::pin(async move { Ok(backup) })
    }

    fn save_backup(&self, backup: BackupEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_writable()?;
            *lock(&store.inner.backup) = Some(backup);
            Ok(())
        })
    }

    fn delete_backup(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_writable()?;
            lock(&store.inner.backup).take();
            Ok(())
        })
    }
}
