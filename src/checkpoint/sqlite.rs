//! SQLite-backed checkpoint store (feature `sqlite`).
//!
//! One row per checkpoint, keyed by id, with history columns denormalized
//! out of the metadata for indexed lookups. The latest-by-thread query is
//! answered directly (`ORDER BY version DESC LIMIT 1`), so wrappers take
//! the fast path instead of listing the history.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;

use super::{Checkpoint, CheckpointStore, PersistedCheckpoint, StoreError, meta};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS checkpoints (
    id           TEXT PRIMARY KEY,
    node_name    TEXT NOT NULL,
    state_json   TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    version      INTEGER NOT NULL,
    execution_id TEXT,
    thread_id    TEXT
);
CREATE INDEX IF NOT EXISTS idx_checkpoints_execution ON checkpoints(execution_id);
CREATE INDEX IF NOT EXISTS idx_checkpoints_thread ON checkpoints(thread_id);
"#;

/// Durable checkpoint store on SQLite.
pub struct SqliteStore<S> {
    pool: Arc<SqlitePool>,
    _state: PhantomData<fn() -> S>,
}

impl<S> std::fmt::Debug for SqliteStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish()
    }
}

impl<S> SqliteStore<S> {
    /// Connect (or create) a SQLite database at `database_url` and apply
    /// the schema. Example URL: `sqlite://stategraph.db?mode=rwc`.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| StoreError::backend(format!("connect error: {e}")))?;
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StoreError::backend(format!("schema: {e}")))?;
        }
        Ok(Self {
            pool: Arc::new(pool),
            _state: PhantomData,
        })
    }
}

fn row_to_record(row: &SqliteRow) -> Result<PersistedCheckpoint, StoreError> {
    let state_json: String = row
        .try_get("state_json")
        .map_err(|e| StoreError::backend(format!("column state_json: {e}")))?;
    let metadata_json: String = row
        .try_get("metadata_json")
        .map_err(|e| StoreError::backend(format!("column metadata_json: {e}")))?;
    let version: i64 = row
        .try_get("version")
        .map_err(|e| StoreError::backend(format!("column version: {e}")))?;
    Ok(PersistedCheckpoint {
        id: row
            .try_get("id")
            .map_err(|e| StoreError::backend(format!("column id: {e}")))?,
        node_name: row
            .try_get("node_name")
            .map_err(|e| StoreError::backend(format!("column node_name: {e}")))?,
        state: serde_json::from_str(&state_json)?,
        metadata: serde_json::from_str(&metadata_json)?,
        timestamp: row
            .try_get("created_at")
            .map_err(|e| StoreError::backend(format!("column created_at: {e}")))?,
        version: version.max(0) as u64,
    })
}

#[async_trait]
impl<S> CheckpointStore<S> for SqliteStore<S>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    #[instrument(skip(self, checkpoint), err)]
    async fn save(&self, checkpoint: Checkpoint<S>) -> Result<(), StoreError> {
        let record = PersistedCheckpoint::from_checkpoint(&checkpoint)?;
        let state_json = serde_json::to_string(&record.state)?;
        let metadata_json = serde_json::to_string(&record.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO checkpoints
                (id, node_name, state_json, metadata_json, created_at, version, execution_id, thread_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                node_name = excluded.node_name,
                state_json = excluded.state_json,
                metadata_json = excluded.metadata_json,
                created_at = excluded.created_at,
                version = excluded.version,
                execution_id = excluded.execution_id,
                thread_id = excluded.thread_id
            "#,
        )
        .bind(&record.id)
        .bind(&record.node_name)
        .bind(&state_json)
        .bind(&metadata_json)
        .bind(&record.timestamp)
        .bind(record.version as i64)
        .bind(record.metadata.get(meta::EXECUTION_ID).and_then(|v| v.as_str()))
        .bind(record.metadata.get(meta::THREAD_ID).and_then(|v| v.as_str()))
        .execute(&*self.pool)
        .await
        .map_err(|e| StoreError::backend(format!("insert checkpoint: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self, id), err)]
    async fn load(&self, id: &str) -> Result<Option<Checkpoint<S>>, StoreError> {
        let row: Option<SqliteRow> = sqlx::query("SELECT * FROM checkpoints WHERE id = ?1")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| StoreError::backend(format!("load checkpoint: {e}")))?;
        match row {
            Some(row) => Ok(Some(row_to_record(&row)?.into_checkpoint()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, group_id), err)]
    async fn list(&self, group_id: &str) -> Result<Vec<Checkpoint<S>>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM checkpoints WHERE execution_id = ?1 OR thread_id = ?1 ORDER BY version ASC",
        )
        .bind(group_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| StoreError::backend(format!("list checkpoints: {e}")))?;
        rows.iter()
            .map(|row| row_to_record(row)?.into_checkpoint())
            .collect()
    }

    #[instrument(skip(self, id), err)]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM checkpoints WHERE id = ?1")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| StoreError::backend(format!("delete checkpoint: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self, group_id), err)]
    async fn clear(&self, group_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM checkpoints WHERE execution_id = ?1 OR thread_id = ?1")
            .bind(group_id)
            .execute(&*self.pool)
            .await
            .map_err(|e| StoreError::backend(format!("clear history: {e}")))?;
        Ok(())
    }

    fn supports_latest_by_thread(&self) -> bool {
        true
    }

    #[instrument(skip(self, thread_id), err)]
    async fn latest_by_thread(&self, thread_id: &str) -> Result<Option<Checkpoint<S>>, StoreError> {
        let row: Option<SqliteRow> = sqlx::query(
            r#"
            SELECT * FROM checkpoints
            WHERE execution_id = ?1 OR thread_id = ?1
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| StoreError::backend(format!("latest checkpoint: {e}")))?;
        match row {
            Some(row) => Ok(Some(row_to_record(&row)?.into_checkpoint()?)),
            None => Ok(None),
        }
    }
}
