use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cdc_mysql::types::Checkpoint;
use parking_lot::Mutex;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::cdc_error;
use crate::error::{CdcResult, ErrorKind};

/// Persists the replication position under a path.
///
/// A checkpoint is only written once everything before it has been emitted, so the
/// last saved checkpoint is always a safe place to resume from.
pub trait CheckpointStore {
    fn save(&self, path: &str, checkpoint: &Checkpoint) -> impl Future<Output = CdcResult<()>> + Send;

    /// Returns `None` if nothing was ever saved under `path`.
    fn load(&self, path: &str) -> impl Future<Output = CdcResult<Option<Checkpoint>>> + Send;
}

/// Stores checkpoints as JSON files below a root directory.
///
/// Writes go to a temporary sibling which is synced and renamed over the target, so a
/// crash leaves either the previous or the new checkpoint behind.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Relative checkpoint paths resolve against `root`, absolute ones are kept.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, path: &str, checkpoint: &Checkpoint) -> CdcResult<()> {
        let file_path = self.file_path(path);
        let temp_path = temp_path(&file_path);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.map_err(|err| {
                cdc_error!(
                    ErrorKind::CheckpointError,
                    "Failed to create checkpoint directory",
                    parent.display(),
                    source: err
                )
            })?;
        }

        let json = serde_json::to_vec_pretty(checkpoint)?;

        let write = async {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .await?;
            file.write_all(&json).await?;
            file.sync_all().await?;

            fs::rename(&temp_path, &file_path).await
        };
        write.await.map_err(|err| {
            cdc_error!(
                ErrorKind::CheckpointError,
                "Failed to write checkpoint",
                file_path.display(),
                source: err
            )
        })?;

        debug!(path = %file_path.display(), %checkpoint, "saved checkpoint");

        Ok(())
    }

    async fn load(&self, path: &str) -> CdcResult<Option<Checkpoint>> {
        let file_path = self.file_path(path);

        let contents = match fs::read(&file_path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(cdc_error!(
                    ErrorKind::CheckpointError,
                    "Failed to read checkpoint",
                    file_path.display(),
                    source: err
                ));
            }
        };

        let checkpoint = serde_json::from_slice(&contents).map_err(|err| {
            cdc_error!(
                ErrorKind::CheckpointError,
                "Checkpoint file is corrupted",
                file_path.display(),
                source: err
            )
        })?;

        Ok(Some(checkpoint))
    }
}

fn temp_path(file_path: &Path) -> PathBuf {
    let mut temp = file_path.as_os_str().to_owned();
    temp.push(".tmp");

    PathBuf::from(temp)
}

/// Keeps checkpoints in memory, shared by every clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Arc<Mutex<HashMap<String, Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the checkpoint saved under `path` without going through the trait.
    pub fn get(&self, path: &str) -> Option<Checkpoint> {
        self.checkpoints.lock().get(path).cloned()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, path: &str, checkpoint: &Checkpoint) -> CdcResult<()> {
        self.checkpoints
            .lock()
            .insert(path.to_string(), checkpoint.clone());

        Ok(())
    }

    async fn load(&self, path: &str) -> CdcResult<Option<Checkpoint>> {
        Ok(self.get(path))
    }
}

#[cfg(test)]
mod tests {
    use cdc_mysql::types::BinlogPosition;

    use super::*;

    fn checkpoint() -> Checkpoint {
        Checkpoint {
            timestamp: 1_700_000_000,
            server_id: 12,
            gtid: Some("3E11FA47-71CA-11E1-9E33-C80AA9429562:23".to_string()),
            binlog: Some(BinlogPosition::new("mysql-bin.000042", 1337)),
            gtid_set: Some("3E11FA47-71CA-11E1-9E33-C80AA9429562:1-23".to_string()),
            transaction_sequence_number: 4,
        }
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        assert!(store.load("replicator/checkpoint.json").await.unwrap().is_none());

        store.save("replicator/checkpoint.json", &checkpoint()).await.unwrap();
        let loaded = store.load("replicator/checkpoint.json").await.unwrap();

        assert_eq!(loaded, Some(checkpoint()));
        assert!(!dir.path().join("replicator/checkpoint.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_overwrites_previous_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        store.save("checkpoint.json", &checkpoint()).await.unwrap();
        let mut newer = checkpoint();
        newer.binlog = Some(BinlogPosition::new("mysql-bin.000043", 4));
        store.save("checkpoint.json", &newer).await.unwrap();

        assert_eq!(store.load("checkpoint.json").await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn test_corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("checkpoint.json"), b"{not json").unwrap();
        let store = FileCheckpointStore::new(dir.path());

        let err = store.load("checkpoint.json").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CheckpointError);
    }

    #[tokio::test]
    async fn test_memory_store_is_shared_between_clones() {
        let store = MemoryCheckpointStore::new();
        let clone = store.clone();

        clone.save("a", &checkpoint()).await.unwrap();

        assert_eq!(store.load("a").await.unwrap(), Some(checkpoint()));
        assert!(store.load("b").await.unwrap().is_none());
    }
}
