//! Control-flow directives emitted by nodes.
//!
//! A node normally returns a plain state delta and lets the graph's edges
//! decide what runs next. Returning a [`Command`] instead lets the node do
//! both at once: contribute a delta *and* override routing for the current
//! step.

use crate::types::is_end;

/// A node's directive to update state and/or redirect the next frontier.
///
/// `update`, when present, is folded through the schema exactly like a plain
/// delta. `goto` names the nodes to run next; when any node in a step
/// returns a non-empty `goto`, the combined targets replace the routing for
/// the *entire* step: static and conditional edges of every node that ran
/// are ignored, not just those of the command's originator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command<S> {
    /// Optional state delta, fed to the reducer in submission order.
    pub update: Option<S>,
    /// Routing override targets. `END` entries terminate that branch.
    pub goto: Vec<String>,
}

impl<S> Default for Command<S> {
    fn default() -> Self {
        Self {
            update: None,
            goto: Vec::new(),
        }
    }
}

impl<S> Command<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Command carrying only a state delta.
    #[must_use]
    pub fn update(state: S) -> Self {
        Self {
            update: Some(state),
            goto: Vec::new(),
        }
    }

    /// Command carrying only a routing target.
    #[must_use]
    pub fn goto(target: impl Into<String>) -> Self {
        Self {
            update: None,
            goto: vec![target.into()],
        }
    }

    #[must_use]
    pub fn with_update(mut self, state: S) -> Self {
        self.update = Some(state);
        self
    }

    #[must_use]
    pub fn with_goto<I, T>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.goto.extend(targets.into_iter().map(Into::into));
        self
    }
}

/// Accumulates goto targets across a step: deduplicated, `END` filtered.
pub(crate) fn collect_goto_targets<'a>(
    accumulated: &mut Vec<String>,
    targets: impl IntoIterator<Item = &'a String>,
) {
    for target in targets {
        if is_end(target) || accumulated.contains(target) {
            continue;
        }
        accumulated.push(target.clone());
    }
}
