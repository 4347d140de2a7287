//! State schemas: the single place where state combination logic lives.
//!
//! A compiled graph advances a state value of type `S`. When a step produces
//! one or more deltas (one per node that ran), the runtime folds them into
//! the running state through the graph's [`Schema`], in submission order.
//! The state is never mutated in place; every fold produces a new value.
//!
//! Three merge strategies exist, in order of precedence:
//!
//! 1. a [`Schema`] set on the builder: full control, including per-field
//!    reducers via [`MapSchema`](crate::reducers::MapSchema);
//! 2. an explicit [`StateMerger`] closure: a lightweight alternative when a
//!    full schema is overkill;
//! 3. last writer wins: the delta replaces the current value outright.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

/// Defines the initial value of a state type and how a single node's output
/// folds into the running state.
///
/// `update` must be pure and deterministic for a fixed input pair: given the
/// same `(current, delta)` it returns the same merged value. The runtime
/// relies on this for resume equivalence: replaying the same deltas from a
/// checkpoint reproduces the same state.
pub trait Schema<S>: Send + Sync {
    /// Returns the zero/initial value of the state type.
    fn init(&self) -> S;

    /// Folds a single delta into the current state, returning the new state.
    fn update(&self, current: S, delta: S) -> Result<S, SchemaError>;
}

/// Plain merge closure used when no [`Schema`] is registered.
///
/// Receives `(current, delta)` and returns the merged state.
pub type StateMerger<S> = Arc<dyn Fn(S, S) -> S + Send + Sync>;

/// Errors raised while folding a delta into the running state.
///
/// A schema error aborts the step and surfaces to the caller as a plain
/// run error.
#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    /// A per-field reducer rejected the shapes it was handed.
    #[error("reducer for field `{field}` failed: {message}")]
    #[diagnostic(
        code(stategraph::schema::field),
        help("Check that the node output for `{field}` matches the shape its reducer expects.")
    )]
    Field { field: String, message: String },

    /// The delta as a whole had the wrong shape for this schema.
    #[error("state update rejected: {0}")]
    #[diagnostic(code(stategraph::schema::shape))]
    Shape(String),

    /// JSON conversion failed while merging values.
    #[error(transparent)]
    #[diagnostic(code(stategraph::schema::serde_json))]
    Serde(#[from] serde_json::Error),
}

impl SchemaError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Last-writer-wins schema for any defaultable state type.
///
/// The fold discards the current value and keeps the delta. This is the
/// behavior a graph gets when it sets neither a schema nor a state merger,
/// exposed as a type for callers that want it explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWriterWins;

impl<S: Default + Send + Sync> Schema<S> for LastWriterWins {
    fn init(&self) -> S {
        S::default()
    }

    fn update(&self, _current: S, delta: S) -> Result<S, SchemaError> {
        Ok(delta)
    }
}
