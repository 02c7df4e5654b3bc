//! JSON documents on the local filesystem.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::fs;

use crate::dao::{
    models::{BackupEntity, ScoreTableEntity, score_table_from_value},
    storage::{StorageError, StorageResult},
    trivia_store::TriviaStore,
};

/// Store writing the score table and the backup snapshot as two JSON files.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    scores_path: Arc<Path>,
    backup_path: Arc<Path>,
}

impl JsonFileStore {
    /// Create a store bound to the given file locations. Nothing is touched on disk yet.
    pub fn new(scores_path: impl Into<PathBuf>, backup_path: impl Into<PathBuf>) -> Self {
        Self {
            scores_path: Arc::from(scores_path.into()),
            backup_path: Arc::from(backup_path.into()),
        }
    }

    /// Location of the score table.
    pub fn scores_path(&self) -> &Path {
        &self.scores_path
    }

    /// Location of the backup snapshot.
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }
}

async fn read_document<T>(path: &Path) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
{
    let contents = match fs::read(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(StorageError::unavailable(
                format!("reading {}", path.display()),
                err,
            ));
        }
    };

    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Serialize `value` next to `path` and atomically rename it into place.
async fn write_document<T>(path: &Path, value: &T) -> StorageResult<()>
where
    T: Serialize,
{
    let payload = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|err| {
            StorageError::unavailable(format!("creating {}", parent.display()), err)
        })?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, payload)
        .await
        .map_err(|err| StorageError::unavailable(format!("writing {}", tmp.display()), err))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|err| StorageError::unavailable(format!("replacing {}", path.display()), err))
}

impl TriviaStore for JsonFileStore {
    fn load_scores(&self) -> BoxFuture<'static, StorageResult<Option<ScoreTableEntity>>> {
        let path = self.scores_path.clone();
        Box::pin(async move {
            let raw = read_document::<IndexMap<String, Value>>(&path).await?;
            Ok(raw.map(score_table_from_value))
        })
    }

    fn save_scores(&self, scores: ScoreTableEntity) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.scores_path.clone();
        Box::pin(async move { write_document(&path, &scores).await })
    }

    fn load_backup(&self) -> BoxFuture<'static, StorageResult<Option<BackupEntity>>> {
        let path = self.backup_path.clone();
        Box::pin(async move { read_document(&path).await })
    }

    fn save_backup(&self, backup: BackupEntity) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.backup_path.clone();
        Box::pin(async move { write_document(&path, &backup).await })
    }

    fn delete_backup(&self) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.backup_path.clone();
        Box::pin(async move {
            match fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(StorageError::unavailable(
                    format!("removing {}", path.display()),
                    err,
                )),
            }
        })
    }
}
