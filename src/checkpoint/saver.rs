//! Checkpointing wrapper: per-step durable snapshots and the state API.
//!
//! [`CheckpointedRunnable`] pairs a compiled graph with a checkpoint store.
//! For the duration of each invocation it installs a step listener that
//! saves a snapshot before the step returns, plus a terminal snapshot when
//! the run completes, which is what makes auto-resume able to tell a
//! finished history from a paused one. Failures inside the auto-save path
//! are logged and swallowed; the run itself never aborts because a snapshot
//! could not be written.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::instrument;

use super::{Checkpoint, CheckpointStore, StoreError, latest_for_group, meta};
use crate::event_bus::{GraphListener, ListenerError};
use crate::graph::Runnable;
use crate::runtime::{RunConfig, RunError};
use crate::types::END;

/// A compiled graph with durable checkpointing attached.
pub struct CheckpointedRunnable<S: Send + Sync + 'static> {
    graph: Runnable<S>,
    store: Arc<dyn CheckpointStore<S>>,
    execution_id: String,
}

/// Snapshot returned by [`CheckpointedRunnable::get_state`].
#[derive(Debug)]
pub struct StateView<S> {
    /// The persisted state.
    pub values: S,
    /// Nodes the run would take up next; empty when the run has finished.
    pub next: Vec<String>,
    /// Config resolving to exactly this snapshot (checkpoint id filled in).
    pub config: RunConfig,
    /// The snapshot's metadata.
    pub metadata: FxHashMap<String, Value>,
    /// When the snapshot was written.
    pub created_at: DateTime<Utc>,
}

impl<S: Clone + Send + Sync + 'static> CheckpointedRunnable<S> {
    /// Wraps a graph with a store under a fresh execution id.
    #[must_use]
    pub fn new(graph: Runnable<S>, store: Arc<dyn CheckpointStore<S>>) -> Self {
        Self::with_execution_id(graph, store, uuid::Uuid::new_v4().to_string())
    }

    /// Wraps a graph with a store under an explicit execution id.
    #[must_use]
    pub fn with_execution_id(
        graph: Runnable<S>,
        store: Arc<dyn CheckpointStore<S>>,
        execution_id: impl Into<String>,
    ) -> Self {
        Self {
            graph,
            store,
            execution_id: execution_id.into(),
        }
    }

    /// The default history identifier used when no thread id is supplied.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// The wrapped graph.
    #[must_use]
    pub fn graph(&self) -> &Runnable<S> {
        &self.graph
    }

    fn history_for(&self, config: &RunConfig) -> String {
        config
            .get_thread_id()
            .unwrap_or(&self.execution_id)
            .to_string()
    }

    /// Runs the graph, snapshotting every step.
    pub async fn invoke(&self, initial: S) -> Result<S, RunError<S>> {
        self.invoke_with_config(initial, RunConfig::default()).await
    }

    /// Runs the graph with per-invocation options, snapshotting every step.
    ///
    /// When the config carries a thread id and no explicit resume frontier,
    /// the latest checkpoint of that thread decides what happens: a terminal
    /// snapshot short-circuits (the persisted state is merged with the new
    /// input and returned without executing anything); a mid-run snapshot
    /// becomes the resume frontier, with its state merged into the input
    /// through the schema.
    #[instrument(skip(self, initial, config), err)]
    pub async fn invoke_with_config(
        &self,
        initial: S,
        mut config: RunConfig,
    ) -> Result<S, RunError<S>> {
        let history = self.history_for(&config);
        let mut initial = initial;

        if config.get_thread_id().is_some() && config.resume_from.is_empty() {
            if let Some(latest) = latest_for_group(self.store.as_ref(), &history).await? {
                let terminal = latest.is_terminal();
                let resumed_from = latest.node_name.clone();
                let merged = self
                    .graph
                    .reduce(latest.state, initial)
                    .map_err(RunError::Schema)?;
                if terminal {
                    tracing::debug!(history = %history, "history already complete; returning persisted state");
                    return Ok(merged);
                }
                config.resume_from = vec![resumed_from];
                initial = merged;
            }
        }

        let saver = Arc::new(StepSaver {
            store: Arc::clone(&self.store),
            history: history.clone(),
            thread_id: config.get_thread_id().map(str::to_string),
            tags: config.tags.clone(),
            extra_metadata: config.metadata.clone(),
        });
        let registration = self.graph.add_listener(saver);
        let result = self.graph.invoke_with_config(initial, config).await;
        self.graph.remove_listener(registration);
        result
    }

    /// Immediate manual save with the next version for this history.
    pub async fn save_checkpoint(
        &self,
        node_name: &str,
        state: S,
    ) -> Result<Checkpoint<S>, StoreError> {
        let version = next_version(self.store.as_ref(), &self.execution_id).await?;
        let checkpoint = Checkpoint::new(node_name, state, version)
            .with_metadata(meta::EXECUTION_ID, Value::String(self.execution_id.clone()))
            .with_metadata(meta::EVENT, Value::String("manual".to_string()));
        self.store.save(checkpoint.clone()).await?;
        Ok(checkpoint)
    }

    /// Direct fetch by checkpoint id.
    pub async fn load_checkpoint(&self, id: &str) -> Result<Option<Checkpoint<S>>, StoreError> {
        self.store.load(id).await
    }

    /// Entire history for the active execution id.
    pub async fn list_checkpoints(&self) -> Result<Vec<Checkpoint<S>>, StoreError> {
        self.store.list(&self.execution_id).await
    }

    /// Deletes the entire history for the active execution id.
    pub async fn clear_checkpoints(&self) -> Result<(), StoreError> {
        self.store.clear(&self.execution_id).await
    }

    /// Resolves a snapshot: by explicit checkpoint id when the config names
    /// one, otherwise the latest for the config's thread (or this wrapper's
    /// execution id).
    pub async fn get_state(&self, config: &RunConfig) -> Result<StateView<S>, StoreError> {
        let checkpoint = self.resolve(config).await?;
        let next = if checkpoint.is_terminal() {
            Vec::new()
        } else {
            vec![checkpoint.node_name.clone()]
        };
        let resolved_config = config.clone().checkpoint_id(checkpoint.id.clone());
        Ok(StateView {
            values: checkpoint.state,
            next,
            config: resolved_config,
            metadata: checkpoint.metadata,
            created_at: checkpoint.created_at,
        })
    }

    /// Human-in-the-loop edit: folds `values` into the latest snapshot via
    /// the graph's merge strategy and writes a new checkpoint tagged as a
    /// manual update. Returns a config pointing at the new checkpoint.
    ///
    /// An edit on a history with no snapshot yet is anchored at the graph's
    /// entry point (unless `as_node` names somewhere else), so a later
    /// invocation on the same thread starts executing from the entry rather
    /// than mistaking the seeded history for a finished one.
    pub async fn update_state(
        &self,
        config: &RunConfig,
        values: S,
        as_node: Option<&str>,
    ) -> Result<RunConfig, RunError<S>> {
        let history = self.history_for(config);
        let latest = match config.get_checkpoint_id() {
            Some(id) => self.store.load(id).await?,
            None => latest_for_group(self.store.as_ref(), &history).await?,
        };

        let (folded, version, node_name) = match latest {
            Some(previous) => {
                let node_name = as_node
                    .map(str::to_string)
                    .unwrap_or_else(|| previous.node_name.clone());
                let version = previous.version + 1;
                let folded = self
                    .graph
                    .reduce(previous.state, values)
                    .map_err(RunError::Schema)?;
                (folded, version, node_name)
            }
            None => {
                let folded = match self.graph.schema() {
                    Some(schema) => schema
                        .update(schema.init(), values)
                        .map_err(RunError::Schema)?,
                    None => values,
                };
                // No history yet: anchor at the entry point so the seeded
                // thread is resumable, not mistaken for a completed run.
                let node_name = as_node.unwrap_or(self.graph.entry_point()).to_string();
                (folded, 1, node_name)
            }
        };

        let mut checkpoint = Checkpoint::new(node_name, folded, version)
            .with_metadata(meta::EXECUTION_ID, Value::String(history.clone()))
            .with_metadata(meta::SOURCE, Value::String("update_state".to_string()));
        if let Some(thread_id) = config.get_thread_id() {
            checkpoint = checkpoint
                .with_metadata(meta::THREAD_ID, Value::String(thread_id.to_string()));
        }
        if let Some(editor) = as_node {
            checkpoint =
                checkpoint.with_metadata(meta::UPDATED_BY, Value::String(editor.to_string()));
        }
        let id = checkpoint.id.clone();
        self.store.save(checkpoint).await.map_err(RunError::Store)?;
        Ok(config.clone().checkpoint_id(id))
    }

    async fn resolve(&self, config: &RunConfig) -> Result<Checkpoint<S>, StoreError> {
        if let Some(id) = config.get_checkpoint_id() {
            return self
                .store
                .load(id)
                .await?
                .ok_or_else(|| StoreError::NotFound { id: id.to_string() });
        }
        let history = self.history_for(config);
        latest_for_group(self.store.as_ref(), &history)
            .await?
            .ok_or(StoreError::NotFound { id: history })
    }
}

async fn next_version<S: Send + Sync + 'static>(
    store: &dyn CheckpointStore<S>,
    history: &str,
) -> Result<u64, StoreError> {
    Ok(latest_for_group(store, history)
        .await?
        .map_or(1, |latest| latest.version + 1))
}

/// Step listener that persists a snapshot per completed step, and a
/// terminal snapshot when the chain ends.
struct StepSaver<S: Send + Sync + 'static> {
    store: Arc<dyn CheckpointStore<S>>,
    history: String,
    thread_id: Option<String>,
    tags: Vec<String>,
    extra_metadata: FxHashMap<String, Value>,
}

impl<S: Clone + Send + Sync + 'static> StepSaver<S> {
    fn checkpoint(&self, node_name: &str, state: &S, event: &str, version: u64) -> Checkpoint<S> {
        let mut checkpoint = Checkpoint::new(node_name, state.clone(), version);
        for (key, value) in &self.extra_metadata {
            checkpoint.metadata.insert(key.clone(), value.clone());
        }
        checkpoint = checkpoint
            .with_metadata(meta::EXECUTION_ID, Value::String(self.history.clone()))
            .with_metadata(meta::EVENT, Value::String(event.to_string()));
        if let Some(thread_id) = &self.thread_id {
            checkpoint = checkpoint
                .with_metadata(meta::THREAD_ID, Value::String(thread_id.clone()));
        }
        if !self.tags.is_empty() {
            checkpoint = checkpoint.with_metadata(
                meta::TAGS,
                Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
            );
        }
        checkpoint
    }

    async fn persist(&self, node_name: &str, state: &S, event: &str) -> Result<(), StoreError> {
        let version = next_version(self.store.as_ref(), &self.history).await?;
        self.store
            .save(self.checkpoint(node_name, state, event, version))
            .await
    }
}

#[async_trait]
impl<S: Clone + Send + Sync + 'static> GraphListener<S> for StepSaver<S> {
    async fn on_step(
        &self,
        label: &str,
        state: &S,
        _step: u64,
        _next: &[String],
    ) -> Result<(), ListenerError> {
        if let Err(err) = self.persist(label, state, "step").await {
            tracing::warn!(
                history = %self.history,
                label,
                error = %err,
                "checkpoint save failed; continuing without a snapshot for this step"
            );
        }
        Ok(())
    }

    async fn on_chain_end(&self, state: &S) -> Result<(), ListenerError> {
        if let Err(err) = self.persist(END, state, "chain_end").await {
            tracing::warn!(
                history = %self.history,
                error = %err,
                "terminal checkpoint save failed"
            );
        }
        Ok(())
    }
}
