//! Routing predicates for conditional edges.

use std::sync::Arc;

/// Predicate for conditional routing.
///
/// Evaluated against the merged post-step state, it returns the name of the
/// node to run next (or `END`). Returning an empty string is a run error;
/// returning an undeclared name is a run error.
///
/// A node with a conditional edge registered ignores its static edges.
///
/// # Examples
///
/// ```
/// use serde_json::Value;
/// use stategraph::graph::EdgePredicate;
/// use stategraph::reducers::MapState;
/// use std::sync::Arc;
///
/// let route: EdgePredicate<MapState> = Arc::new(|state| {
///     if state.get("value").and_then(Value::as_i64).unwrap_or(0) > 15 {
///         "high".to_string()
///     } else {
///         "low".to_string()
///     }
/// });
/// # let _ = route;
/// ```
pub type EdgePredicate<S> = Arc<dyn Fn(&S) -> String + Send + Sync + 'static>;
