//! Node abstractions: the unit of computation in a graph.
//!
//! A [`Node`] receives the pre-step state and an execution context, performs
//! its work, and returns either a plain state delta or a [`Command`] that
//! also redirects routing. Nodes should be stateless and deterministic;
//! anything observable goes through the context.
//!
//! # Examples
//!
//! ```
//! use async_trait::async_trait;
//! use serde_json::json;
//! use stategraph::node::{Node, NodeContext, NodeError, NodeOutput};
//! use stategraph::reducers::{MapState, map_state};
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Node<MapState> for Greeter {
//!     async fn run(
//!         &self,
//!         _state: MapState,
//!         _ctx: NodeContext<MapState>,
//!     ) -> Result<NodeOutput<MapState>, NodeError> {
//!         Ok(NodeOutput::update(map_state([("greeting", json!("hello"))])))
//!     }
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use crate::control::Command;
use crate::event_bus::{Event, EventEmitter, ListenerSet, LlmEvent};
use crate::runtime::CancelToken;

/// Core trait for executable graph nodes.
///
/// Errors returned here abort the run (after retries, when a retry policy is
/// configured), with one exception: the error produced by
/// [`NodeContext::interrupt`] pauses the run instead and hands control back
/// to the caller.
#[async_trait]
pub trait Node<S: Send + Sync + 'static>: Send + Sync {
    /// Execute this node against a snapshot of the current state.
    async fn run(&self, state: S, ctx: NodeContext<S>) -> Result<NodeOutput<S>, NodeError>;

    /// Optional human-readable description, surfaced by tooling.
    fn description(&self) -> Option<&str> {
        None
    }
}

/// What a node produced: a plain delta, or a delta plus routing override.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeOutput<S> {
    /// A state delta for the reducer.
    Update(S),
    /// A [`Command`]: optional delta plus `goto` targets that replace the
    /// step's routing.
    Command(Command<S>),
}

impl<S> NodeOutput<S> {
    #[must_use]
    pub fn update(state: S) -> Self {
        NodeOutput::Update(state)
    }

    #[must_use]
    pub fn command(command: Command<S>) -> Self {
        NodeOutput::Command(command)
    }
}

impl<S> From<Command<S>> for NodeOutput<S> {
    fn from(command: Command<S>) -> Self {
        NodeOutput::Command(command)
    }
}

/// Adapter turning an async closure into a [`Node`].
///
/// ```
/// use serde_json::json;
/// use stategraph::node::{FnNode, NodeError, NodeOutput};
/// use stategraph::reducers::{MapState, map_state};
///
/// let node = FnNode::new(|_state: MapState, _ctx: stategraph::node::NodeContext<MapState>| async move {
///     Ok::<_, NodeError>(NodeOutput::update(map_state([("done", json!(true))])))
/// });
/// # let _ = node;
/// ```
pub struct FnNode<F> {
    f: F,
}

impl<F> FnNode<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<S, F, Fut> Node<S> for FnNode<F>
where
    S: Send + Sync + 'static,
    F: Fn(S, NodeContext<S>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<NodeOutput<S>, NodeError>> + Send,
{
    async fn run(&self, state: S, ctx: NodeContext<S>) -> Result<NodeOutput<S>, NodeError> {
        (self.f)(state, ctx).await
    }
}

/// Execution context passed to a node for one run.
///
/// Carries the node's identity, the step number, the event emitter and
/// listener set for observability, the invocation's configurable map, the
/// cancellation signal, and, on a resumed run, the injected resume value.
#[derive(Clone)]
pub struct NodeContext<S: Send + Sync + 'static> {
    pub(crate) node: String,
    pub(crate) step: u64,
    pub(crate) emitter: Arc<dyn EventEmitter<S>>,
    pub(crate) listeners: Arc<ListenerSet<S>>,
    pub(crate) configurable: Arc<FxHashMap<String, Value>>,
    pub(crate) resume: Option<Value>,
    pub(crate) cancel: CancelToken,
}

impl<S: Send + Sync + 'static> NodeContext<S> {
    /// Name this node was registered under.
    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Current step number (1-based).
    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Dynamic interrupt primitive.
    ///
    /// On a fresh run this fails with the distinguished interrupt error,
    /// which the step loop converts into a paused outcome carrying `value`.
    /// On a resumed run with an injected resume value, it returns that value
    /// instead and the node continues.
    pub fn interrupt(&self, value: Value) -> Result<Value, NodeError> {
        match &self.resume {
            Some(answer) => Ok(answer.clone()),
            None => Err(NodeError::Interrupted { value }),
        }
    }

    /// The injected resume value, if this run is resuming a dynamic
    /// interrupt at this node.
    #[must_use]
    pub fn resume_value(&self) -> Option<&Value> {
        self.resume.as_ref()
    }

    /// Reads a key from the invocation's configurable map.
    #[must_use]
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.configurable.get(key)
    }

    /// `true` once the caller has requested cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the caller requests cancellation.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Report progress. Shorthand for [`emit_progress`](Self::emit_progress).
    pub async fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), NodeContextError> {
        self.emit_progress(scope, message).await
    }

    /// Report progress: notifies per-node listeners and publishes a
    /// [`Event::NodeProgress`] enriched with this node's identity and step.
    pub async fn emit_progress(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), NodeContextError> {
        let scope = scope.into();
        let message = message.into();
        self.listeners
            .notify_node_progress(&self.node, self.step, &scope, &message)
            .await;
        self.emitter
            .emit(Event::NodeProgress {
                node: self.node.clone(),
                step: self.step,
                scope,
                message,
            })
            .map_err(|_| NodeContextError::EventBusUnavailable)
    }

    /// Publish a model-streaming chunk event.
    pub fn emit_llm_chunk(
        &self,
        stream_id: Option<String>,
        chunk: impl Into<String>,
    ) -> Result<(), NodeContextError> {
        self.emitter
            .emit(Event::Llm(LlmEvent::chunk(
                Some(self.node.clone()),
                stream_id,
                chunk,
            )))
            .map_err(|_| NodeContextError::EventBusUnavailable)
    }

    /// Publish a final model-streaming event.
    pub fn emit_llm_final(
        &self,
        stream_id: Option<String>,
        chunk: impl Into<String>,
    ) -> Result<(), NodeContextError> {
        self.emitter
            .emit(Event::Llm(LlmEvent::final_chunk(
                Some(self.node.clone()),
                stream_id,
                chunk,
            )))
            .map_err(|_| NodeContextError::EventBusUnavailable)
    }
}

impl<S: Send + Sync + 'static> fmt::Debug for NodeContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("node", &self.node)
            .field("step", &self.step)
            .field("resume", &self.resume.is_some())
            .finish_non_exhaustive()
    }
}

/// Errors that can occur when using context methods.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeContextError {
    /// Event could not be published because the bus has shut down.
    #[error("failed to emit event: event bus unavailable")]
    #[diagnostic(
        code(stategraph::node::event_bus_unavailable),
        help("The event bus for this invocation has closed. Check run lifetime.")
    )]
    EventBusUnavailable,
}

/// Errors raised during node execution.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(stategraph::node::missing_input),
        help("Check that an earlier node produced the required data: {what}.")
    )]
    MissingInput { what: &'static str },

    /// External provider or service error.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(stategraph::node::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(stategraph::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Input validation failed.
    #[error("validation failed: {0}")]
    #[diagnostic(
        code(stategraph::node::validation),
        help("Check input data format and required fields.")
    )]
    ValidationFailed(String),

    /// Dynamic interrupt raised through [`NodeContext::interrupt`].
    ///
    /// Not a failure: the step loop converts this into a paused run. Never
    /// retried.
    #[error("node requested interrupt")]
    #[diagnostic(code(stategraph::node::interrupted))]
    Interrupted { value: Value },

    /// The node body panicked; converted by the executor.
    #[error("node `{node}` panicked: {message}")]
    #[diagnostic(code(stategraph::node::panicked))]
    Panicked { node: String, message: String },

    /// The node exceeded the configured per-node timeout.
    #[error("node `{node}` timed out after {after:?}")]
    #[diagnostic(code(stategraph::node::timeout))]
    Timeout {
        node: String,
        after: std::time::Duration,
    },

    /// The invocation was cancelled while this node was pending.
    #[error("execution cancelled")]
    #[diagnostic(code(stategraph::node::cancelled))]
    Cancelled,

    /// Event bus communication error.
    #[error("event bus error: {0}")]
    #[diagnostic(code(stategraph::node::event_bus))]
    EventBus(#[from] NodeContextError),

    /// Free-form error for application nodes.
    #[error("{0}")]
    #[diagnostic(code(stategraph::node::other))]
    Other(String),
}

impl NodeError {
    /// `true` for the distinguished dynamic-interrupt error.
    #[must_use]
    pub fn is_interrupt(&self) -> bool {
        matches!(self, NodeError::Interrupted { .. })
    }

    /// `true` for cancellation, which is surfaced verbatim and never retried.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, NodeError::Cancelled)
    }

    pub fn other(message: impl Into<String>) -> Self {
        NodeError::Other(message.into())
    }
}
