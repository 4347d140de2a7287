//! Graph definition, validation, and the compiled runnable.
//!
//! [`GraphBuilder`] collects nodes, edges, conditional routing, the entry
//! point, and merge/retry configuration; [`GraphBuilder::compile`] validates
//! the structure and freezes it into a [`Runnable`], the executable form.
//!
//! # Quick start
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
//!     .add_node_fn("collect", |_state: MapState, _ctx| async move {
//!         Ok(NodeOutput::update(map_state([("log", json!("collected"))])))
//!     })
//!     .set_schema(MapSchema::new().with_append("log"))
//!     .set_entry_point("collect")
//!     .add_edge("collect", END)
//!     .compile()
//!     .expect("valid graph");
//!
//! let final_state = graph.invoke(MapState::default()).await.expect("run");
//! assert_eq!(final_state["log"], json!(["collected"]));
//! # }
//! ```

mod builder;
mod compile;
mod edges;
mod runnable;

pub use builder::GraphBuilder;
pub use compile::GraphCompileError;
pub use edges::EdgePredicate;
pub use runnable::Runnable;
