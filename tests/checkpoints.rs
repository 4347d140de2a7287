//! Checkpointing wrapper: per-step snapshots, auto-resume, manual edits.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use common::{TagNode, messages_of};
use stategraph::checkpoint::{
    Checkpoint, CheckpointStore, CheckpointedRunnable, MemoryStore, StoreError, meta,
};
use stategraph::graph::{GraphBuilder, Runnable};
use stategraph::reducers::{MapSchema, MapState, map_state};
use stategraph::runtime::{RunConfig, RunError};
use stategraph::types::END;

fn chain() -> (Runnable<MapState>, TagNode, TagNode, TagNode) {
    let a = TagNode::new("A");
    let b = TagNode::new("B");
    let c = TagNode::new("C");
    let graph = GraphBuilder::new()
        .add_node("a", a.clone())
        .add_node("b", b.clone())
        .add_node("c", c.clone())
        .set_schema(MapSchema::new().with_append("messages"))
        .set_entry_point("a")
        .add_edge("a", "b")
        .add_edge("b", "c")
        .add_edge("c", END)
        .compile()
        .unwrap();
    (graph, a, b, c)
}

fn wrapped() -> (
    CheckpointedRunnable<MapState>,
    Arc<MemoryStore<MapState>>,
    TagNode,
    TagNode,
    TagNode,
) {
    let (graph, a, b, c) = chain();
    let store = Arc::new(MemoryStore::new());
    let wrapper = CheckpointedRunnable::new(graph, store.clone());
    (wrapper, store, a, b, c)
}

#[tokio::test]
async fn every_step_is_snapshotted_with_monotonic_versions() {
    let (wrapper, ..) = wrapped();
    wrapper
        .invoke(map_state([("messages", json!(["start"]))]))
        .await
        .unwrap();

    let mut history = wrapper.list_checkpoints().await.unwrap();
    history.sort_by_key(|cp| cp.version);

    // Three steps plus the terminal snapshot.
    assert_eq!(history.len(), 4);
    let labels: Vec<&str> = history.iter().map(|cp| cp.node_name.as_str()).collect();
    assert_eq!(labels, vec!["a", "b", "c", END]);
    for pair in history.windows(2) {
        assert!(pair[0].version < pair[1].version);
    }
    assert!(history.iter().all(|cp| cp.execution_id().is_some()));
    assert_eq!(
        history[0].metadata.get(meta::EVENT),
        Some(&json!("step"))
    );
    assert_eq!(
        history[3].metadata.get(meta::EVENT),
        Some(&json!("chain_end"))
    );
}

#[tokio::test]
async fn step_snapshot_carries_the_merged_state() {
    let (wrapper, ..) = wrapped();
    wrapper
        .invoke(map_state([("messages", json!(["start"]))]))
        .await
        .unwrap();

    let mut history = wrapper.list_checkpoints().await.unwrap();
    history.sort_by_key(|cp| cp.version);
    assert_eq!(messages_of(&history[0].state), vec!["start", "A"]);
    assert_eq!(messages_of(&history[1].state), vec!["start", "A", "B"]);
}

#[tokio::test]
async fn auto_resume_returns_the_persisted_state_without_re_executing() {
    let (wrapper, _store, a, b, c) = wrapped();
    let config = RunConfig::with_thread_id("thread-5");

    let first = wrapper
        .invoke_with_config(map_state([("messages", json!(["start"]))]), config.clone())
        .await
        .unwrap();
    assert_eq!(messages_of(&first), vec!["start", "A", "B", "C"]);
    assert_eq!((a.run_count(), b.run_count(), c.run_count()), (1, 1, 1));

    let second = wrapper
        .invoke_with_config(map_state([("messages", json!(["again"]))]), config)
        .await
        .unwrap();
    // Persisted state merged with the new input, no node re-executed.
    assert_eq!(messages_of(&second), vec!["start", "A", "B", "C", "again"]);
    assert_eq!((a.run_count(), b.run_count(), c.run_count()), (1, 1, 1));
}

#[tokio::test]
async fn interrupted_thread_resumes_from_its_latest_checkpoint() {
    let (wrapper, _store, a, _b, c) = wrapped();
    let mut config = RunConfig::with_thread_id("thread-resume");
    config.interrupt_after = vec!["b".to_string()];

    let interrupt = wrapper
        .invoke_with_config(map_state([("messages", json!(["start"]))]), config)
        .await
        .unwrap_err()
        .into_interrupt()
        .unwrap();
    assert_eq!(interrupt.next_nodes, vec!["c"]);
    assert_eq!(c.run_count(), 0);

    // A fresh call with only the thread id picks up after the pause. The
    // latest snapshot is for step "b", so "b" re-executes, then "c".
    let finished = wrapper
        .invoke_with_config(MapState::default(), RunConfig::with_thread_id("thread-resume"))
        .await
        .unwrap();
    assert_eq!(a.run_count(), 1);
    assert_eq!(c.run_count(), 1);
    assert_eq!(
        messages_of(&finished),
        vec!["start", "A", "B", "B", "C"]
    );
}

#[tokio::test]
async fn get_state_resolves_latest_and_reports_next() {
    let (wrapper, ..) = wrapped();
    let mut config = RunConfig::with_thread_id("thread-view");
    config.interrupt_after = vec!["b".to_string()];

    wrapper
        .invoke_with_config(map_state([("messages", json!(["start"]))]), config.clone())
        .await
        .unwrap_err();

    let view = wrapper.get_state(&config).await.unwrap();
    assert_eq!(view.next, vec!["b"]);
    assert_eq!(messages_of(&view.values), vec!["start", "A", "B"]);
    assert!(view.config.get_checkpoint_id().is_some());

    // Completing the run flips the view to terminal.
    wrapper
        .invoke_with_config(MapState::default(), RunConfig::with_thread_id("thread-view"))
        .await
        .unwrap();
    let done = wrapper
        .get_state(&RunConfig::with_thread_id("thread-view"))
        .await
        .unwrap();
    assert!(done.next.is_empty());
}

#[tokio::test]
async fn get_state_by_explicit_checkpoint_id() {
    let (wrapper, ..) = wrapped();
    wrapper
        .invoke(map_state([("messages", json!(["start"]))]))
        .await
        .unwrap();
    let mut history = wrapper.list_checkpoints().await.unwrap();
    history.sort_by_key(|cp| cp.version);
    let first = &history[0];

    let config = RunConfig::new().checkpoint_id(first.id.clone());
    let view = wrapper.get_state(&config).await.unwrap();
    assert_eq!(messages_of(&view.values), vec!["start", "A"]);
    assert_eq!(view.config.get_checkpoint_id(), Some(first.id.as_str()));
}

#[tokio::test]
async fn get_state_without_history_is_not_found() {
    let (wrapper, ..) = wrapped();
    let err = wrapper
        .get_state(&RunConfig::with_thread_id("empty-thread"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn update_state_writes_a_tagged_checkpoint_and_points_at_it() {
    let (wrapper, ..) = wrapped();
    let config = RunConfig::with_thread_id("thread-edit");
    wrapper
        .invoke_with_config(map_state([("messages", json!(["start"]))]), config.clone())
        .await
        .unwrap();

    let edited = wrapper
        .update_state(
            &config,
            map_state([("messages", json!("human note"))]),
            Some("editor"),
        )
        .await
        .unwrap();
    let id = edited.get_checkpoint_id().expect("config points at the edit");

    let checkpoint = wrapper.load_checkpoint(id).await.unwrap().unwrap();
    assert_eq!(
        checkpoint.metadata.get(meta::SOURCE),
        Some(&json!("update_state"))
    );
    assert_eq!(
        checkpoint.metadata.get(meta::UPDATED_BY),
        Some(&json!("editor"))
    );
    assert_eq!(
        messages_of(&checkpoint.state),
        vec!["start", "A", "B", "C", "human note"]
    );

    // The edit advances the history version.
    let latest_version = wrapper
        .list_checkpoints()
        .await
        .unwrap()
        .iter()
        .map(|cp| cp.version)
        .max()
        .unwrap();
    assert_eq!(checkpoint.version, latest_version);
}

#[tokio::test]
async fn update_state_on_a_fresh_thread_seeds_a_resumable_history() {
    let (wrapper, _store, a, b, c) = wrapped();
    let config = RunConfig::with_thread_id("thread-seeded");

    // Seed a thread that has never been invoked.
    let seeded = wrapper
        .update_state(&config, map_state([("messages", json!("seeded"))]), None)
        .await
        .unwrap();
    let id = seeded.get_checkpoint_id().unwrap();
    let checkpoint = wrapper.load_checkpoint(id).await.unwrap().unwrap();
    // Anchored at the entry point, not marked as a finished run.
    assert_eq!(checkpoint.node_name, "a");
    assert!(!checkpoint.is_terminal());

    // The next invocation on that thread executes the whole graph from the
    // entry, starting from the seeded state.
    let out = wrapper
        .invoke_with_config(map_state([("messages", json!(["start"]))]), config)
        .await
        .unwrap();
    assert_eq!((a.run_count(), b.run_count(), c.run_count()), (1, 1, 1));
    assert_eq!(
        messages_of(&out),
        vec!["seeded", "start", "A", "B", "C"]
    );
}

#[tokio::test]
async fn update_state_between_interrupt_and_resume_takes_effect() {
    let (wrapper, ..) = wrapped();
    let mut config = RunConfig::with_thread_id("thread-hitl");
    config.interrupt_after = vec!["b".to_string()];

    wrapper
        .invoke_with_config(map_state([("messages", json!(["start"]))]), config.clone())
        .await
        .unwrap_err();

    wrapper
        .update_state(
            &RunConfig::with_thread_id("thread-hitl"),
            map_state([("messages", json!("edited"))]),
            None,
        )
        .await
        .unwrap();

    let finished = wrapper
        .invoke_with_config(MapState::default(), RunConfig::with_thread_id("thread-hitl"))
        .await
        .unwrap();
    let messages = messages_of(&finished);
    assert!(messages.contains(&"edited".to_string()));
    assert_eq!(messages.last().unwrap(), "C");
}

#[tokio::test]
async fn manual_save_and_clear() {
    let (wrapper, ..) = wrapped();
    let saved = wrapper
        .save_checkpoint("manual-point", map_state([("k", json!(1))]))
        .await
        .unwrap();
    assert_eq!(saved.version, 1);
    assert!(wrapper.load_checkpoint(&saved.id).await.unwrap().is_some());

    let second = wrapper
        .save_checkpoint("manual-point", map_state([("k", json!(2))]))
        .await
        .unwrap();
    assert_eq!(second.version, 2);

    wrapper.clear_checkpoints().await.unwrap();
    assert!(wrapper.list_checkpoints().await.unwrap().is_empty());
    assert!(wrapper.load_checkpoint(&saved.id).await.unwrap().is_none());
}

/// Store whose saves always fail, for exercising the swallowed-error path.
struct BrokenStore;

#[async_trait]
impl CheckpointStore<MapState> for BrokenStore {
    async fn save(&self, _checkpoint: Checkpoint<MapState>) -> Result<(), StoreError> {
        Err(StoreError::backend("disk on fire"))
    }

    async fn load(&self, _id: &str) -> Result<Option<Checkpoint<MapState>>, StoreError> {
        Ok(None)
    }

    async fn list(&self, _group_id: &str) -> Result<Vec<Checkpoint<MapState>>, StoreError> {
        Ok(Vec::new())
    }

    async fn delete(&self, _id: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn clear(&self, _group_id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn auto_save_failures_are_swallowed() {
    let (graph, ..) = chain();
    let wrapper = CheckpointedRunnable::new(graph, Arc::new(BrokenStore));
    let out = wrapper
        .invoke(map_state([("messages", json!(["start"]))]))
        .await
        .unwrap();
    // Execution completed despite every save failing; no snapshot visible.
    assert_eq!(messages_of(&out), vec!["start", "A", "B", "C"]);
    assert!(wrapper.list_checkpoints().await.unwrap().is_empty());
}

#[tokio::test]
async fn explicit_store_errors_surface_to_the_caller() {
    let (graph, ..) = chain();
    let wrapper = CheckpointedRunnable::new(graph, Arc::new(BrokenStore));
    let err = wrapper
        .save_checkpoint("point", MapState::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Backend { .. }));
}

#[tokio::test]
async fn histories_are_isolated_by_thread() {
    let (graph, ..) = chain();
    let store = Arc::new(MemoryStore::new());
    let wrapper = CheckpointedRunnable::new(graph, store.clone());

    wrapper
        .invoke_with_config(
            map_state([("messages", json!(["one"]))]),
            RunConfig::with_thread_id("t1"),
        )
        .await
        .unwrap();
    wrapper
        .invoke_with_config(
            map_state([("messages", json!(["two"]))]),
            RunConfig::with_thread_id("t2"),
        )
        .await
        .unwrap();

    let t1 = store.list("t1").await.unwrap();
    let t2 = store.list("t2").await.unwrap();
    assert_eq!(t1.len(), 4);
    assert_eq!(t2.len(), 4);
    assert!(t1.iter().all(|cp| cp.thread_id() == Some("t1")));
    assert!(t2.iter().all(|cp| cp.thread_id() == Some("t2")));
}

#[tokio::test]
async fn resume_from_config_bypasses_auto_resume() {
    let (wrapper, _store, a, _b, c) = wrapped();
    let config = RunConfig::with_thread_id("thread-explicit");
    wrapper
        .invoke_with_config(map_state([("messages", json!(["start"]))]), config)
        .await
        .unwrap();

    // Explicit resume_from wins over the stored history.
    let mut config = RunConfig::with_thread_id("thread-explicit");
    config.resume_from = vec!["c".to_string()];
    let out = wrapper
        .invoke_with_config(map_state([("messages", json!(["tail"]))]), config)
        .await
        .unwrap();
    assert_eq!(a.run_count(), 1);
    assert_eq!(c.run_count(), 2);
    assert_eq!(messages_of(&out), vec!["tail", "C"]);
}

#[tokio::test]
async fn run_errors_pass_through_the_wrapper() {
    let graph = GraphBuilder::new()
        .add_node_fn("boom", |_state: MapState, _ctx| async move {
            Err::<stategraph::node::NodeOutput<MapState>, _>(stategraph::node::NodeError::other(
                "boom",
            ))
        })
        .set_entry_point("boom")
        .add_edge("boom", END)
        .compile()
        .unwrap();
    let wrapper = CheckpointedRunnable::new(graph, Arc::new(MemoryStore::new()));
    let err = wrapper.invoke(MapState::default()).await.unwrap_err();
    assert!(matches!(err, RunError::Node { .. }));
}
