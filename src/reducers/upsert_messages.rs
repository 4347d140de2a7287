use serde_json::Value;

use super::ValueReducer;

/// Merges message lists by message id.
///
/// The field holds a sequence of message objects, each with an `id` string.
/// Incoming messages with an id already present replace that entry in place;
/// everything else appends in arrival order. Messages without an id (or with
/// an empty one) always append, matching the behavior of a fresh message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UpsertMessages;

fn message_id(value: &Value) -> Option<&str> {
    value
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

impl ValueReducer for UpsertMessages {
    fn apply(&self, current: Option<&Value>, update: &Value) -> Result<Value, String> {
        let mut items = match current {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(existing)) => existing.clone(),
            Some(_) => return Err("message field must hold a sequence".to_string()),
        };

        let incoming: Vec<Value> = match update {
            Value::Array(batch) => batch.clone(),
            single => vec![single.clone()],
        };

        for message in incoming {
            if !message.is_object() {
                return Err("message updates must be objects".to_string());
            }
            match message_id(&message)
                .and_then(|id| items.iter().position(|m| message_id(m) == Some(id)))
            {
                Some(slot) => items[slot] = message,
                None => items.push(message),
            }
        }
        Ok(Value::Array(items))
    }
}
