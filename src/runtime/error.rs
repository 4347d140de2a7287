//! Run-level error taxonomy.

use std::fmt;

use thiserror::Error;

use crate::checkpoint::StoreError;
use crate::node::NodeError;
use crate::runtime::GraphInterrupt;
use crate::schema::SchemaError;

/// How an invocation can end other than with a final state.
///
/// [`RunError::Interrupted`] is not a failure: it is the paused outcome of
/// the interrupt protocol, distinguishable by type, carrying the state at
/// the interruption boundary and the frontier to resume from. Everything
/// else aborts the run; nothing is recovered automatically except through
/// the retry policy inside the node executor.
#[derive(Error)]
pub enum RunError<S> {
    /// Execution paused; resume with the carried frontier.
    #[error("execution interrupted at node `{}`", .0.node)]
    Interrupted(GraphInterrupt<S>),

    /// A node failed after exhausting any configured retries.
    #[error("node `{node}` failed: {source}")]
    Node {
        node: String,
        #[source]
        source: NodeError,
    },

    /// The reducer rejected a merge; the step aborted.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A conditional edge returned an empty target name.
    #[error("conditional edge for node `{node}` returned an empty target")]
    EmptyRoute { node: String },

    /// A node that ran has neither a conditional edge nor static edges.
    #[error("node `{node}` has no outgoing edges")]
    MissingRoute { node: String },

    /// A conditional edge routed to a name the graph does not declare.
    #[error("conditional edge for node `{node}` routed to unknown node `{target}`")]
    UnknownRouteTarget { node: String, target: String },

    /// The frontier (typically a `resume_from`) names an undeclared node.
    #[error("frontier names unknown node `{name}`")]
    UnknownNode { name: String },

    /// The caller's cancellation signal fired; returned verbatim.
    #[error("execution cancelled")]
    Cancelled,

    /// A worker task failed to join.
    #[error("workflow task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A checkpoint store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl<S> RunError<S> {
    /// `true` when this outcome is a pause rather than a failure.
    #[must_use]
    pub fn is_interrupt(&self) -> bool {
        matches!(self, RunError::Interrupted(_))
    }

    /// Extracts the pause, if that is what this outcome is.
    pub fn into_interrupt(self) -> Result<GraphInterrupt<S>, Self> {
        match self {
            RunError::Interrupted(interrupt) => Ok(interrupt),
            other => Err(other),
        }
    }
}

// Hand-written so the state type needs no Debug bound.
impl<S> fmt::Debug for RunError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Interrupted(interrupt) => {
                f.debug_tuple("Interrupted").field(interrupt).finish()
            }
            other => write!(f, "{other}"),
        }
    }
}
