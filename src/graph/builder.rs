//! Fluent construction of workflow graphs.

use std::future::Future;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::edges::EdgePredicate;
use crate::event_bus::EventBusConfig;
use crate::node::{FnNode, Node, NodeContext, NodeError, NodeOutput};
use crate::runtime::RetryPolicy;
use crate::schema::{Schema, StateMerger};
use crate::types::is_end;

/// Builder for workflow graphs.
///
/// Collects node registrations, edges, the entry point, and merge/retry
/// configuration, then [`compile`](Self::compile)s into an immutable
/// [`Runnable`](crate::graph::Runnable). Structural mistakes (missing entry
/// point, edges to undeclared nodes, reuse of the `END` sentinel) are
/// reported at compile, not at run time.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use stategraph::graph::GraphBuilder;
/// use stategraph::node::NodeOutput;
/// use stategraph::reducers::{MapSchema, MapState, map_state};
/// use stategraph::types::END;
///
/// let graph = GraphBuilder::new()
///     .add_node_fn("greet", |_state: MapState, _ctx| async move {
///         Ok(NodeOutput::update(map_state([("messages", json!("hello"))])))
///     })
///     .set_schema(MapSchema::new().with_append("messages"))
///     .set_entry_point("greet")
///     .add_edge("greet", END)
///     .compile()
///     .expect("valid graph");
/// # let _ = graph;
/// ```
pub struct GraphBuilder<S: Send + Sync + 'static> {
    pub(super) nodes: FxHashMap<String, Arc<dyn Node<S>>>,
    pub(super) edges: FxHashMap<String, Vec<String>>,
    pub(super) conditional_edges: FxHashMap<String, EdgePredicate<S>>,
    pub(super) entry: Option<String>,
    pub(super) schema: Option<Arc<dyn Schema<S>>>,
    pub(super) merger: Option<StateMerger<S>>,
    pub(super) retry_policy: Option<RetryPolicy>,
    pub(super) bus_config: EventBusConfig,
    pub(super) issues: Vec<super::compile::GraphCompileError>,
}

impl<S: Send + Sync + 'static> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + Sync + 'static> GraphBuilder<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            conditional_edges: FxHashMap::default(),
            entry: None,
            schema: None,
            merger: None,
            retry_policy: None,
            bus_config: EventBusConfig::default(),
            issues: Vec::new(),
        }
    }

    /// Registers a node under a unique name.
    ///
    /// Registering the reserved `END` name or reusing a name is recorded and
    /// rejected at [`compile`](Self::compile).
    #[must_use]
    pub fn add_node(mut self, name: impl Into<String>, node: impl Node<S> + 'static) -> Self {
        let name = name.into();
        if is_end(&name) {
            self.issues
                .push(super::compile::GraphCompileError::ReservedNodeName { name });
            return self;
        }
        if self.nodes.contains_key(&name) {
            self.issues
                .push(super::compile::GraphCompileError::DuplicateNode { name });
            return self;
        }
        self.nodes.insert(name, Arc::new(node));
        self
    }

    /// Registers an async closure as a node.
    #[must_use]
    pub fn add_node_fn<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(S, NodeContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<NodeOutput<S>, NodeError>> + Send + 'static,
    {
        self.add_node(name, FnNode::new(f))
    }

    /// Adds a static edge. Multiple edges from one node fan out in parallel.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.entry(from.into()).or_default().push(to.into());
        self
    }

    /// Registers a conditional edge for a node, replacing any earlier one.
    ///
    /// While a conditional edge is registered, static edges from the same
    /// node are ignored.
    #[must_use]
    pub fn add_conditional_edge(
        mut self,
        from: impl Into<String>,
        predicate: EdgePredicate<S>,
    ) -> Self {
        self.conditional_edges.insert(from.into(), predicate);
        self
    }

    /// Declares the node execution starts from.
    #[must_use]
    pub fn set_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Sets the schema that folds node outputs into the running state.
    #[must_use]
    pub fn set_schema(mut self, schema: impl Schema<S> + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Sets a plain merge closure, consulted only when no schema is set.
    #[must_use]
    pub fn set_state_merger(mut self, merger: StateMerger<S>) -> Self {
        self.merger = Some(merger);
        self
    }

    /// Applies a retry policy to every node of the graph.
    #[must_use]
    pub fn set_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Overrides event buffering / default sinks for invocations.
    #[must_use]
    pub fn with_event_bus(mut self, config: EventBusConfig) -> Self {
        self.bus_config = config;
        self
    }
}
