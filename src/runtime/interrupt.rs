//! Paused-execution outcome carrying a resumable position.

use std::fmt;

use serde_json::Value;

use crate::runtime::RunConfig;

/// A paused run: where it stopped, the state at that boundary, and the
/// frontier to resume from.
///
/// Raised in three ways: the caller listed a node in `interrupt_before`
/// (pauses before the node runs, `state` is the pre-step state), the caller
/// listed it in `interrupt_after` (pauses after the step merged, `state` is
/// the merged state), or the node itself called
/// [`NodeContext::interrupt`](crate::node::NodeContext::interrupt)
/// (`value` carries the node's payload and `next_nodes` is that node alone).
#[derive(Clone, PartialEq)]
pub struct GraphInterrupt<S> {
    /// The node the pause is anchored to.
    pub node: String,
    /// State at the interruption boundary.
    pub state: S,
    /// Frontier to pass back as `resume_from`.
    pub next_nodes: Vec<String>,
    /// Payload of a dynamic interrupt; `None` for static interrupts.
    pub value: Option<Value>,
}

impl<S> GraphInterrupt<S> {
    /// Config pre-filled to resume this pause.
    ///
    /// The caller supplies the state (usually [`GraphInterrupt::state`],
    /// possibly edited) to the next invocation alongside this config.
    #[must_use]
    pub fn resume_config(&self) -> RunConfig {
        RunConfig::new().resume_from(self.next_nodes.clone())
    }
}

impl<S> fmt::Debug for GraphInterrupt<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphInterrupt")
            .field("node", &self.node)
            .field("next_nodes", &self.next_nodes)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}
