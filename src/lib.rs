//! # stategraph: stateful directed-graph workflow runtime
//!
//! stategraph compiles a declared graph of named computation nodes into an
//! immutable runnable that repeatedly advances a typed state value from an
//! entry node through static or conditional edges until the terminal
//! sentinel [`END`](types::END) is reached or execution is suspended.
//!
//! ## Core Concepts
//!
//! - **Nodes**: async units of work that take the current state and return a
//!   delta (or a [`Command`](control::Command) that also redirects routing)
//! - **Steps**: one pass of the scheduler: parallel fan-out over the
//!   frontier, a deterministic merge of the results, then routing
//! - **Schemas**: the single place where state combination logic lives,
//!   with per-field reducers for map-shaped states
//! - **Interrupts**: first-class pauses (static or raised mid-node) that
//!   carry the state and a resumable frontier
//! - **Checkpoints**: durable per-step snapshots with thread-scoped
//!   histories, auto-resume, and human-in-the-loop state edits
//!
//! ## Building a Simple Workflow
//!
//! ```
//! use serde_json::json;
//! use stategraph::graph::GraphBuilder;
//! use stategraph::node::NodeOutput;
//! use stategraph::reducers::{MapSchema, MapState, map_state};
//! use stategraph::types::END;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let graph = GraphBuilder::new()
//!     .add_node_fn("draft", |_state: MapState, _ctx| async move {
//!         Ok(NodeOutput::update(map_state([("messages", json!("draft ready"))])))
//!     })
//!     .add_node_fn("review", |_state: MapState, _ctx| async move {
//!         Ok(NodeOutput::update(map_state([("messages", json!("reviewed"))])))
//!     })
//!     .set_schema(MapSchema::new().with_append("messages"))
//!     .set_entry_point("draft")
//!     .add_edge("draft", "review")
//!     .add_edge("review", END)
//!     .compile()
//!     .expect("valid graph");
//!
//! let out = graph
//!     .invoke(map_state([("messages", json!(["start"]))]))
//!     .await
//!     .expect("run to completion");
//! assert_eq!(out["messages"], json!(["start", "draft ready", "reviewed"]));
//! # }
//! ```
//!
//! ## Interrupt and Resume
//!
//! A caller can pause around named nodes (`interrupt_before` /
//! `interrupt_after` on [`RunConfig`](runtime::RunConfig)), and a node can
//! pause itself with
//! [`NodeContext::interrupt`](node::NodeContext::interrupt). Either way the
//! run returns [`RunError::Interrupted`](runtime::RunError) carrying the
//! state at the boundary and the frontier to pass back as `resume_from`.
//!
//! ## Durable Checkpoints
//!
//! Wrap a compiled graph in a
//! [`CheckpointedRunnable`](checkpoint::CheckpointedRunnable) to snapshot
//! every step into a pluggable [`CheckpointStore`](checkpoint::CheckpointStore)
//! (in-memory, JSON files, or SQLite with the `sqlite` feature). Invoking
//! again with the same thread id resumes from the latest snapshot, or
//! returns the persisted result outright when the history already finished.
//!
//! ## Module Guide
//!
//! - [`graph`] - builder, validation, and the compiled [`Runnable`](graph::Runnable)
//! - [`node`] - the [`Node`](node::Node) trait, context, and node errors
//! - [`schema`] / [`reducers`] - state merge strategies
//! - [`control`] - the [`Command`](control::Command) routing override
//! - [`runtime`] - run configuration, retry, interrupts, cancellation
//! - [`checkpoint`] - snapshots, stores, and the checkpointing wrapper
//! - [`event_bus`] - listeners, the broadcast hub, and sinks
//! - [`stream`] - streaming execution over a bounded buffer
//! - [`telemetry`] - tracing setup and event formatting

pub mod checkpoint;
pub mod control;
pub mod event_bus;
pub mod graph;
pub mod message;
pub mod node;
pub mod reducers;
pub mod runtime;
pub mod schema;
pub mod stream;
pub mod telemetry;
pub mod types;
