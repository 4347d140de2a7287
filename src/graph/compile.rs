//! Graph validation and compilation.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

use super::builder::GraphBuilder;
use super::runnable::Runnable;
use crate::event_bus::ListenerSet;
use crate::types::is_end;

/// Structural problems reported by [`GraphBuilder::compile`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum GraphCompileError {
    /// No entry point was declared.
    #[error("graph has no entry point")]
    #[diagnostic(
        code(stategraph::compile::missing_entry),
        help("Call set_entry_point with the name of the first node to run.")
    )]
    MissingEntryPoint,

    /// The entry point names a node that was never registered.
    #[error("entry point `{name}` is not a registered node")]
    #[diagnostic(code(stategraph::compile::unknown_entry))]
    UnknownEntryPoint { name: String },

    /// A node was registered under the reserved terminal sentinel.
    #[error("`{name}` is reserved and cannot be registered as a node")]
    #[diagnostic(
        code(stategraph::compile::reserved_name),
        help("The terminal sentinel has no node body; route edges to it instead.")
    )]
    ReservedNodeName { name: String },

    /// Two nodes were registered under the same name.
    #[error("node `{name}` registered twice")]
    #[diagnostic(code(stategraph::compile::duplicate_node))]
    DuplicateNode { name: String },

    /// An edge starts at a name that is not a registered node.
    #[error("edge from unknown node `{from}`")]
    #[diagnostic(code(stategraph::compile::unknown_edge_source))]
    UnknownEdgeSource { from: String },

    /// An edge targets a name that is neither a registered node nor `END`.
    #[error("edge `{from}` -> `{to}` targets an unknown node")]
    #[diagnostic(code(stategraph::compile::unknown_edge_target))]
    UnknownEdgeTarget { from: String, to: String },

    /// A conditional edge is registered for a name that is not a node.
    #[error("conditional edge from unknown node `{from}`")]
    #[diagnostic(code(stategraph::compile::unknown_conditional_source))]
    UnknownConditionalSource { from: String },
}

impl<S: Send + Sync + 'static> GraphBuilder<S> {
    /// Validates the graph and freezes it into an immutable [`Runnable`].
    ///
    /// Checks, in order: problems recorded during building (reserved or
    /// duplicate names), the entry point, and that every edge endpoint
    /// references a declared node (or `END`, targets only). The first
    /// problem found is returned.
    pub fn compile(mut self) -> Result<Runnable<S>, GraphCompileError> {
        if let Some(issue) = self.issues.drain(..).next() {
            return Err(issue);
        }

        let entry = self.entry.ok_or(GraphCompileError::MissingEntryPoint)?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphCompileError::UnknownEntryPoint { name: entry });
        }

        for (from, targets) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphCompileError::UnknownEdgeSource { from: from.clone() });
            }
            for to in targets {
                if !is_end(to) && !self.nodes.contains_key(to) {
                    return Err(GraphCompileError::UnknownEdgeTarget {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
            }
        }

        for from in self.conditional_edges.keys() {
            if !self.nodes.contains_key(from) {
                return Err(GraphCompileError::UnknownConditionalSource { from: from.clone() });
            }
        }

        Ok(Runnable::from_parts(
            self.nodes,
            self.edges,
            self.conditional_edges,
            entry,
            self.schema,
            self.merger,
            self.retry_policy,
            Arc::new(ListenerSet::new()),
            self.bus_config,
        ))
    }
}
