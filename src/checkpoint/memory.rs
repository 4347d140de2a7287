//! Volatile in-process checkpoint store.

use std::sync::RwLock;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use super::{Checkpoint, CheckpointStore, StoreError};

/// In-memory store keyed by checkpoint id. Fast, non-durable; suited to
/// tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore<S> {
    inner: RwLock<FxHashMap<String, Checkpoint<S>>>,
}

impl<S> MemoryStore<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(FxHashMap::default()),
        }
    }
}

#[async_trait]
impl<S: Clone + Send + Sync + 'static> CheckpointStore<S> for MemoryStore<S> {
    async fn save(&self, checkpoint: Checkpoint<S>) -> Result<(), StoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|e| StoreError::backend(format!("lock poisoned: {e}")))?;
        map.insert(checkpoint.id.clone(), checkpoint);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Checkpoint<S>>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|e| StoreError::backend(format!("lock poisoned: {e}")))?;
        Ok(map.get(id).cloned())
    }

    async fn list(&self, group_id: &str) -> Result<Vec<Checkpoint<S>>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|e| StoreError::backend(format!("lock poisoned: {e}")))?;
        Ok(map
            .values()
            .filter(|cp| cp.matches_group(group_id))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|e| StoreError::backend(format!("lock poisoned: {e}")))?;
        map.remove(id);
        Ok(())
    }

    async fn clear(&self, group_id: &str) -> Result<(), StoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|e| StoreError::backend(format!("lock poisoned: {e}")))?;
        map.retain(|_, cp| !cp.matches_group(group_id));
        Ok(())
    }

    fn supports_latest_by_thread(&self) -> bool {
        true
    }

    async fn latest_by_thread(&self, thread_id: &str) -> Result<Option<Checkpoint<S>>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|e| StoreError::backend(format!("lock poisoned: {e}")))?;
        Ok(map
            .values()
            .filter(|cp| cp.matches_group(thread_id))
            .max_by_key(|cp| cp.version)
            .cloned())
    }
}
