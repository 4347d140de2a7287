use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::{AppendValues, FieldReducers, UpsertMessages, ValueReducer};
use crate::schema::{Schema, SchemaError};

/// Field-keyed state: a map from field name to JSON value.
pub type MapState = FxHashMap<String, Value>;

/// Builds a [`MapState`] from `(field, value)` pairs.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use stategraph::reducers::map_state;
///
/// let state = map_state([("value", json!(10)), ("tag", json!("fresh"))]);
/// assert_eq!(state["value"], json!(10));
/// ```
pub fn map_state<I, K>(entries: I) -> MapState
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Schema over [`MapState`] driven by per-field reducers.
///
/// Folding a delta merges key by key: a registered reducer decides the
/// field's merge, anything else overwrites, and fields missing from the
/// delta keep their current value.
#[derive(Clone, Debug, Default)]
pub struct MapSchema {
    reducers: FieldReducers,
}

impl MapSchema {
    #[must_use]
    pub fn new() -> Self {
        Self {
            reducers: FieldReducers::new(),
        }
    }

    #[must_use]
    pub fn with_reducers(reducers: FieldReducers) -> Self {
        Self { reducers }
    }

    /// Registers a reducer for a field.
    #[must_use]
    pub fn with_reducer(mut self, field: impl Into<String>, reducer: Arc<dyn ValueReducer>) -> Self {
        self.reducers.register(field, reducer);
        self
    }

    /// Shorthand: append-to-sequence semantics for a field.
    #[must_use]
    pub fn with_append(self, field: impl Into<String>) -> Self {
        self.with_reducer(field, Arc::new(AppendValues))
    }

    /// Shorthand: message upsert-by-id semantics for a field.
    #[must_use]
    pub fn with_message_upsert(self, field: impl Into<String>) -> Self {
        self.with_reducer(field, Arc::new(UpsertMessages))
    }

    #[must_use]
    pub fn reducers(&self) -> &FieldReducers {
        &self.reducers
    }
}

impl Schema<MapState> for MapSchema {
    fn init(&self) -> MapState {
        MapState::default()
    }

    fn update(&self, mut current: MapState, delta: MapState) -> Result<MapState, SchemaError> {
        for (field, incoming) in delta {
            let merged = self
                .reducers
                .apply(&field, current.get(&field), &incoming)
                .map_err(|message| SchemaError::field(&field, message))?;
            current.insert(field, merged);
        }
        Ok(current)
    }
}
