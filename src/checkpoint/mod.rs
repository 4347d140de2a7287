//! Durable checkpoints: per-step snapshots, thread-scoped histories, and the
//! pluggable store interface.
//!
//! A [`Checkpoint`] anchors a resume point: the merged state after a step,
//! the step's label, a strictly increasing version within its history, and
//! metadata tying it to an execution or thread. [`CheckpointStore`] is the
//! persistence seam: backends differ only in durability and performance
//! trade-offs, and the runtime never assumes a particular one.

mod file;
mod memory;
mod persist;
mod saver;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use file::{DIR_ENV, FileStore};
pub use memory::MemoryStore;
pub use persist::PersistedCheckpoint;
pub use saver::{CheckpointedRunnable, StateView};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use crate::types::is_end;

/// Well-known checkpoint metadata keys.
pub mod meta {
    /// Groups checkpoints into a history.
    pub const EXECUTION_ID: &str = "execution_id";
    /// Persistent-conversation identifier, when the caller supplied one.
    pub const THREAD_ID: &str = "thread_id";
    /// What produced the snapshot: `"step"` or `"chain_end"`.
    pub const EVENT: &str = "event";
    /// Set to `"update_state"` on snapshots written by a manual edit.
    pub const SOURCE: &str = "source";
    /// The node a manual edit was attributed to.
    pub const UPDATED_BY: &str = "updated_by";
    /// Caller tags copied from the invocation config.
    pub const TAGS: &str = "tags";
}

/// A durable snapshot of execution state at a step boundary.
#[derive(Clone, PartialEq)]
pub struct Checkpoint<S> {
    /// Globally unique identifier, freshly generated per save.
    pub id: String,
    /// Label of the completed step; `END` (or empty) marks a finished run.
    pub node_name: String,
    /// Merged state after the step.
    pub state: S,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Strictly monotonically increasing within one history, in save order.
    pub version: u64,
    /// Grouping and provenance; see [`meta`].
    pub metadata: FxHashMap<String, Value>,
}

impl<S> Checkpoint<S> {
    /// Fresh checkpoint with a new unique id and the given version.
    #[must_use]
    pub fn new(node_name: impl Into<String>, state: S, version: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            node_name: node_name.into(),
            state,
            created_at: Utc::now(),
            version,
            metadata: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The history identifier recorded under [`meta::EXECUTION_ID`].
    #[must_use]
    pub fn execution_id(&self) -> Option<&str> {
        self.metadata.get(meta::EXECUTION_ID).and_then(Value::as_str)
    }

    /// The conversation identifier recorded under [`meta::THREAD_ID`].
    #[must_use]
    pub fn thread_id(&self) -> Option<&str> {
        self.metadata.get(meta::THREAD_ID).and_then(Value::as_str)
    }

    /// `true` when this checkpoint belongs to the given history: either its
    /// execution id or its thread id matches.
    #[must_use]
    pub fn matches_group(&self, group_id: &str) -> bool {
        self.execution_id() == Some(group_id) || self.thread_id() == Some(group_id)
    }

    /// `true` when this checkpoint marks a completed run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.node_name.is_empty() || is_end(&self.node_name)
    }
}

// Hand-written so the state type needs no Debug bound.
impl<S> fmt::Debug for Checkpoint<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkpoint")
            .field("id", &self.id)
            .field("node_name", &self.node_name)
            .field("version", &self.version)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Errors from checkpoint store operations.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// No checkpoint exists under the given identifier.
    #[error("checkpoint not found: {id}")]
    #[diagnostic(
        code(stategraph::store::not_found),
        help("Verify the checkpoint id `{id}` and that its history has not been cleared.")
    )]
    NotFound { id: String },

    /// Backend storage error (database, filesystem, lock poisoning).
    #[error("backend error: {message}")]
    #[diagnostic(
        code(stategraph::store::backend),
        help("Check backend connectivity and permissions; backend message: {message}.")
    )]
    Backend { message: String },

    /// State or metadata failed to (de)serialize.
    #[error("serialization failed: {source}")]
    #[diagnostic(code(stategraph::store::serde))]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Pluggable checkpoint persistence.
///
/// Contract every backend upholds: a `save` followed by `load(id)` in the
/// same process observes the saved value; `list(group)` returns every
/// checkpoint whose history matches, without duplicate ids; `delete` and
/// `clear` are idempotent. Backends synchronize internally; the runtime
/// issues writes serially from one invocation, but the store may be shared
/// across invocations targeting the same history.
#[async_trait]
pub trait CheckpointStore<S: Send + Sync + 'static>: Send + Sync {
    /// Persist a checkpoint. Saving the same id twice replaces it.
    async fn save(&self, checkpoint: Checkpoint<S>) -> Result<(), StoreError>;

    /// Direct fetch by id; `Ok(None)` when absent.
    async fn load(&self, id: &str) -> Result<Option<Checkpoint<S>>, StoreError>;

    /// Every checkpoint in the given history, in unspecified order.
    async fn list(&self, group_id: &str) -> Result<Vec<Checkpoint<S>>, StoreError>;

    /// Remove one checkpoint. Idempotent.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Remove an entire history. Idempotent.
    async fn clear(&self, group_id: &str) -> Result<(), StoreError>;

    /// Capability probe for [`latest_by_thread`](Self::latest_by_thread).
    ///
    /// Callers that find this `false` fall back to `list` plus a version
    /// argmax.
    fn supports_latest_by_thread(&self) -> bool {
        false
    }

    /// Highest-version checkpoint of a thread, when the backend can answer
    /// directly.
    async fn latest_by_thread(&self, _thread_id: &str) -> Result<Option<Checkpoint<S>>, StoreError> {
        Ok(None)
    }
}

/// Highest-version checkpoint of a history, probing the store's direct
/// lookup first and falling back to a full list.
pub async fn latest_for_group<S: Send + Sync + 'static>(
    store: &dyn CheckpointStore<S>,
    group_id: &str,
) -> Result<Option<Checkpoint<S>>, StoreError> {
    if store.supports_latest_by_thread() {
        return store.latest_by_thread(group_id).await;
    }
    let mut checkpoints = store.list(group_id).await?;
    checkpoints.sort_by_key(|cp| cp.version);
    Ok(checkpoints.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_unique_and_metadata_is_readable() {
        let a = Checkpoint::new("step-a", 1_i64, 1)
            .with_metadata(meta::EXECUTION_ID, json!("run-1"))
            .with_metadata(meta::THREAD_ID, json!("thread-9"));
        let b = Checkpoint::new("step-a", 1_i64, 2);
        assert_ne!(a.id, b.id);
        assert_eq!(a.execution_id(), Some("run-1"));
        assert_eq!(a.thread_id(), Some("thread-9"));
        assert!(a.matches_group("run-1"));
        assert!(a.matches_group("thread-9"));
        assert!(!a.matches_group("other"));
    }

    #[test]
    fn terminal_detection() {
        assert!(Checkpoint::new(crate::types::END, 0_i64, 1).is_terminal());
        assert!(Checkpoint::new("", 0_i64, 1).is_terminal());
        assert!(!Checkpoint::new("worker", 0_i64, 1).is_terminal());
    }
}
