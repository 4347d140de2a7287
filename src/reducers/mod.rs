//! Merge strategies for map-shaped states.
//!
//! Field-keyed states are the common case for agent workflows: the state is
//! a map from field name to JSON value, and each field decides how parallel
//! updates combine. A [`ValueReducer`] is that per-field decision; the
//! [`FieldReducers`] registry binds reducers to field names; [`MapSchema`]
//! packages the registry as a [`Schema`](crate::schema::Schema) over
//! [`MapState`]. Unregistered fields default to overwrite.

mod append;
mod map_schema;
mod overwrite;
mod registry;
mod upsert_messages;

pub use append::AppendValues;
pub use map_schema::{MapSchema, MapState, map_state};
pub use overwrite::Overwrite;
pub use registry::FieldReducers;
pub use upsert_messages::UpsertMessages;

use serde_json::Value;

/// Per-field merge operation.
///
/// `current` is the field's present value, or `None` the first time the
/// field is written. Errors are plain messages; the schema attaches the
/// field name before surfacing them.
pub trait ValueReducer: Send + Sync {
    fn apply(&self, current: Option<&Value>, update: &Value) -> Result<Value, String>;
}
