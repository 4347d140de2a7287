//! The compiled, immutable form of a graph.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::instrument;

use super::edges::EdgePredicate;
use crate::event_bus::{EventBus, EventBusConfig, GraphListener, ListenerSet};
use crate::node::Node;
use crate::runtime::scheduler::run_loop;
use crate::runtime::{RetryPolicy, RunConfig, RunError};
use crate::schema::{Schema, SchemaError, StateMerger};
use crate::types::ListenerId;

/// An immutable, executable graph.
///
/// Produced by [`GraphBuilder::compile`](crate::graph::GraphBuilder::compile);
/// the topology is never mutated afterwards. The only dynamic part is the
/// listener registry, which may gain and lose observers between (or during)
/// invocations.
///
/// Cloning is cheap: node bodies, predicates, and the listener registry are
/// shared behind `Arc`s.
pub struct Runnable<S: Send + Sync + 'static> {
    nodes: FxHashMap<String, Arc<dyn Node<S>>>,
    edges: FxHashMap<String, Vec<String>>,
    conditional_edges: FxHashMap<String, EdgePredicate<S>>,
    entry: String,
    schema: Option<Arc<dyn Schema<S>>>,
    merger: Option<StateMerger<S>>,
    retry_policy: Option<RetryPolicy>,
    listeners: Arc<ListenerSet<S>>,
    bus_config: EventBusConfig,
}

impl<S: Send + Sync + 'static> std::fmt::Debug for Runnable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runnable")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl<S: Send + Sync + 'static> Clone for Runnable<S> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            conditional_edges: self.conditional_edges.clone(),
            entry: self.entry.clone(),
            schema: self.schema.clone(),
            merger: self.merger.clone(),
            retry_policy: self.retry_policy.clone(),
            listeners: Arc::clone(&self.listeners),
            bus_config: self.bus_config.clone(),
        }
    }
}

impl<S: Send + Sync + 'static> Runnable<S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        nodes: FxHashMap<String, Arc<dyn Node<S>>>,
        edges: FxHashMap<String, Vec<String>>,
        conditional_edges: FxHashMap<String, EdgePredicate<S>>,
        entry: String,
        schema: Option<Arc<dyn Schema<S>>>,
        merger: Option<StateMerger<S>>,
        retry_policy: Option<RetryPolicy>,
        listeners: Arc<ListenerSet<S>>,
        bus_config: EventBusConfig,
    ) -> Self {
        Self {
            nodes,
            edges,
            conditional_edges,
            entry,
            schema,
            merger,
            retry_policy,
            listeners,
            bus_config,
        }
    }

    /// The declared entry node.
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.entry
    }

    /// Names of all registered nodes, in no particular order.
    #[must_use]
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    pub(crate) fn node(&self, name: &str) -> Option<Arc<dyn Node<S>>> {
        self.nodes.get(name).cloned()
    }

    pub(crate) fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub(crate) fn static_edges(&self, from: &str) -> &[String] {
        self.edges.get(from).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn conditional_edge(&self, from: &str) -> Option<&EdgePredicate<S>> {
        self.conditional_edges.get(from)
    }

    pub(crate) fn listeners(&self) -> Arc<ListenerSet<S>> {
        Arc::clone(&self.listeners)
    }

    pub(crate) fn bus_config(&self) -> &EventBusConfig {
        &self.bus_config
    }

    /// The schema set at build time, if any.
    #[must_use]
    pub fn schema(&self) -> Option<&Arc<dyn Schema<S>>> {
        self.schema.as_ref()
    }

    /// Folds one delta into the running state: schema, else merger closure,
    /// else last writer wins.
    pub(crate) fn reduce(&self, current: S, delta: S) -> Result<S, SchemaError> {
        if let Some(schema) = &self.schema {
            schema.update(current, delta)
        } else if let Some(merger) = &self.merger {
            Ok(merger(current, delta))
        } else {
            Ok(delta)
        }
    }

    /// Registers a listener; returns the id that removes it.
    pub fn add_listener(&self, listener: Arc<dyn GraphListener<S>>) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Removes a listener registration by id.
    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id)
    }
}

impl<S: Clone + Send + Sync + 'static> Runnable<S> {
    /// Runs the graph from the entry point to completion.
    #[instrument(skip(self, initial), err)]
    pub async fn invoke(&self, initial: S) -> Result<S, RunError<S>> {
        self.invoke_with_config(initial, RunConfig::default()).await
    }

    /// Runs the graph with per-invocation options (thread id, interrupts,
    /// resume, cancellation, timeouts).
    #[instrument(skip(self, initial, config), err)]
    pub async fn invoke_with_config(
        &self,
        initial: S,
        config: RunConfig,
    ) -> Result<S, RunError<S>> {
        let bus = EventBus::from_config(self.bus_config());
        bus.start();
        let result = run_loop(self, initial, &config, bus.emitter()).await;
        bus.shutdown().await;
        result
    }

    /// Runs the graph emitting into a caller-owned event bus.
    ///
    /// The bus outlives the invocation; the caller keeps ownership and
    /// decides when to close it.
    #[instrument(skip(self, initial, config, bus), err)]
    pub async fn invoke_with_bus(
        &self,
        initial: S,
        config: RunConfig,
        bus: &EventBus<S>,
    ) -> Result<S, RunError<S>> {
        bus.start();
        run_loop(self, initial, &config, bus.emitter()).await
    }
}
