//! Directory-of-JSON-files checkpoint store.
//!
//! One file per checkpoint, named `<id>.json`, in a configured directory.
//! Listing scans the directory and filters by history; clearing removes the
//! matching files. Files are created owner-readable only where the platform
//! supports it.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Checkpoint, CheckpointStore, PersistedCheckpoint, StoreError};

/// Environment variable naming the default checkpoint directory.
pub const DIR_ENV: &str = "STATEGRAPH_DIR";
const DEFAULT_DIR: &str = "stategraph_checkpoints";

/// File-backed checkpoint store.
pub struct FileStore<S> {
    dir: PathBuf,
    _state: PhantomData<fn() -> S>,
}

impl<S> FileStore<S> {
    /// Store rooted at the given directory (created lazily on first save).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _state: PhantomData,
        }
    }

    /// Store rooted at `$STATEGRAPH_DIR`, falling back to a directory under
    /// the working directory. Loads `.env` first so the variable can live
    /// there.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let dir = std::env::var(DIR_ENV).unwrap_or_else(|_| DEFAULT_DIR.to_string());
        Self::new(dir)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

async fn read_record(path: &Path) -> Result<Option<PersistedCheckpoint>, StoreError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::backend(format!("read {}: {err}", path.display()))),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

#[cfg(unix)]
async fn restrict_to_owner(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await;
}

#[cfg(not(unix))]
async fn restrict_to_owner(_path: &Path) {}

#[async_trait]
impl<S> CheckpointStore<S> for FileStore<S>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn save(&self, checkpoint: Checkpoint<S>) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| StoreError::backend(format!("create {}: {err}", self.dir.display())))?;
        let record = PersistedCheckpoint::from_checkpoint(&checkpoint)?;
        let path = self.path_for(&checkpoint.id);
        let rendered = serde_json::to_string_pretty(&record)?;
        tokio::fs::write(&path, rendered)
            .await
            .map_err(|err| StoreError::backend(format!("write {}: {err}", path.display())))?;
        restrict_to_owner(&path).await;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Checkpoint<S>>, StoreError> {
        match read_record(&self.path_for(id)).await? {
            Some(record) => Ok(Some(record.into_checkpoint()?)),
            None => Ok(None),
        }
    }

    async fn list(&self, group_id: &str) -> Result<Vec<Checkpoint<S>>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(StoreError::backend(format!(
                    "scan {}: {err}",
                    self.dir.display()
                )));
            }
        };
        let mut checkpoints = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| StoreError::backend(format!("scan {}: {err}", self.dir.display())))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(record) = read_record(&path).await?
                && record.matches_group(group_id)
            {
                checkpoints.push(record.into_checkpoint()?);
            }
        }
        Ok(checkpoints)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::backend(format!(
                "remove {}: {err}",
                path.display()
            ))),
        }
    }

    async fn clear(&self, group_id: &str) -> Result<(), StoreError> {
        let matching = self.list(group_id).await?;
        for checkpoint in matching {
            self.delete(&checkpoint.id).await?;
        }
        Ok(())
    }
}
