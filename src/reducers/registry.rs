use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::{Overwrite, ValueReducer};

/// Binds merge strategies to field names.
///
/// Fields without a registered reducer fall back to [`Overwrite`]. The
/// registry is frozen once its schema is handed to a compiled graph, so
/// registration happens at build time only.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use stategraph::reducers::{AppendValues, FieldReducers, UpsertMessages};
///
/// let reducers = FieldReducers::new()
///     .with_reducer("log", Arc::new(AppendValues))
///     .with_reducer("messages", Arc::new(UpsertMessages));
/// ```
#[derive(Clone)]
pub struct FieldReducers {
    by_field: FxHashMap<String, Arc<dyn ValueReducer>>,
    fallback: Arc<dyn ValueReducer>,
}

impl Default for FieldReducers {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldReducers {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_field: FxHashMap::default(),
            fallback: Arc::new(Overwrite),
        }
    }

    /// Registers a reducer for a field, replacing any earlier registration.
    pub fn register(&mut self, field: impl Into<String>, reducer: Arc<dyn ValueReducer>) -> &mut Self {
        self.by_field.insert(field.into(), reducer);
        self
    }

    /// Builder-style registration for fluent construction.
    #[must_use]
    pub fn with_reducer(mut self, field: impl Into<String>, reducer: Arc<dyn ValueReducer>) -> Self {
        self.register(field, reducer);
        self
    }

    /// Returns `true` if the field has an explicit reducer.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.by_field.contains_key(field)
    }

    /// Applies the field's reducer (or the overwrite fallback) to one update.
    pub fn apply(
        &self,
        field: &str,
        current: Option<&Value>,
        update: &Value,
    ) -> Result<Value, String> {
        self.by_field
            .get(field)
            .unwrap_or(&self.fallback)
            .apply(current, update)
    }
}

impl std::fmt::Debug for FieldReducers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fields: Vec<&str> = self.by_field.keys().map(String::as_str).collect();
        fields.sort_unstable();
        f.debug_struct("FieldReducers").field("fields", &fields).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducers::AppendValues;
    use serde_json::json;

    #[test]
    fn unregistered_fields_overwrite() {
        let reducers = FieldReducers::new();
        let merged = reducers.apply("x", Some(&json!(1)), &json!(2)).unwrap();
        assert_eq!(merged, json!(2));
    }

    #[test]
    fn registered_reducer_wins() {
        let reducers = FieldReducers::new().with_reducer("log", Arc::new(AppendValues));
        let merged = reducers.apply("log", Some(&json!(["a"])), &json!("b")).unwrap();
        assert_eq!(merged, json!(["a", "b"]));
        assert!(reducers.contains("log"));
        assert!(!reducers.contains("other"));
    }
}
