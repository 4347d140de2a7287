//! Serde shapes for persisted checkpoints.
//!
//! Persistent backends store this explicit representation rather than the
//! in-memory [`Checkpoint`], keeping the wire format stable and the
//! conversion logic in one place. States must round-trip through JSON for
//! file and key-value backends, so the persisted state is an opaque
//! [`Value`]. No I/O happens here.

use chrono::Utc;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Checkpoint, StoreError};

/// Persisted form of a checkpoint: one JSON object per snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint {
    pub id: String,
    pub node_name: String,
    /// Opaque JSON projection of the state.
    pub state: Value,
    #[serde(default)]
    pub metadata: FxHashMap<String, Value>,
    /// RFC3339 creation time.
    pub timestamp: String,
    pub version: u64,
}

impl PersistedCheckpoint {
    /// Projects an in-memory checkpoint into its persisted shape.
    pub fn from_checkpoint<S: Serialize>(cp: &Checkpoint<S>) -> Result<Self, StoreError> {
        Ok(Self {
            id: cp.id.clone(),
            node_name: cp.node_name.clone(),
            state: serde_json::to_value(&cp.state)?,
            metadata: cp.metadata.clone(),
            timestamp: cp.created_at.to_rfc3339(),
            version: cp.version,
        })
    }

    /// Rehydrates the in-memory checkpoint.
    ///
    /// An unparseable timestamp degrades to "now" rather than failing the
    /// load; the state itself must parse.
    pub fn into_checkpoint<S: DeserializeOwned>(self) -> Result<Checkpoint<S>, StoreError> {
        let created_at = chrono::DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Ok(Checkpoint {
            id: self.id,
            node_name: self.node_name,
            state: serde_json::from_value(self.state)?,
            created_at,
            version: self.version,
            metadata: self.metadata,
        })
    }

    /// `true` when this record belongs to the given history.
    #[must_use]
    pub fn matches_group(&self, group_id: &str) -> bool {
        let matches = |key: &str| {
            self.metadata.get(key).and_then(Value::as_str) == Some(group_id)
        };
        matches(super::meta::EXECUTION_ID) || matches(super::meta::THREAD_ID)
    }
}
