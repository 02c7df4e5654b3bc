pub mod file;
pub mod memory;

use crate::dao::models::{BackupEntity, ScoreTableEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

pub use self::file::JsonFileStore;
pub use self::memory::InMemoryStore;

/// Abstraction over the durable score file and the round backup snapshot.
///
/// Writes replace the whole document; implementations must never expose a
/// partially written score table or backup.
pub trait TriviaStore: Send + Sync {
    /// Read the score table, `None` when nothing has been persisted yet.
    fn load_scores(&self) -> BoxFuture<'static, StorageResult<Option<ScoreTableEntity>>>;
    /// Replace the persisted score table.
    fn save_scores(&self, scores: ScoreTableEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Read the backup snapshot if one exists.
    fn load_backup(&self) -> BoxFuture<'static, StorageResult<Option<BackupEntity>>>;
    /// Replace the backup snapshot.
    fn save_backup(&self, backup: BackupEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove the backup snapshot; removing a missing snapshot is not an error.
    fn delete_backup(&self) -> BoxFuture<'static, StorageResult<()>>;
}
