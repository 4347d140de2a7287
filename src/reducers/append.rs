use serde_json::Value;

use super::ValueReducer;

/// Appends the update to a sequence-valued field.
///
/// The update may be a single element or a sequence of elements; a sequence
/// is spliced rather than nested. A missing or null current value starts
/// from an empty sequence. A current value that is neither null nor a
/// sequence is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AppendValues;

impl ValueReducer for AppendValues {
    fn apply(&self, current: Option<&Value>, update: &Value) -> Result<Value, String> {
        let mut items = match current {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(existing)) => existing.clone(),
            Some(other) => {
                return Err(format!(
                    "cannot append to non-sequence value of type {}",
                    value_type_name(other)
                ));
            }
        };
        match update {
            Value::Array(incoming) => items.extend(incoming.iter().cloned()),
            single => items.push(single.clone()),
        }
        Ok(Value::Array(items))
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nil_current_starts_empty() {
        let r = AppendValues;
        assert_eq!(r.apply(None, &json!("a")).unwrap(), json!(["a"]));
        assert_eq!(
            r.apply(Some(&Value::Null), &json!(["a", "b"])).unwrap(),
            json!(["a", "b"])
        );
    }

    #[test]
    fn single_element_appends() {
        let r = AppendValues;
        let merged = r.apply(Some(&json!(["start"])), &json!("A")).unwrap();
        assert_eq!(merged, json!(["start", "A"]));
    }

    #[test]
    fn sequence_splices() {
        let r = AppendValues;
        let merged = r.apply(Some(&json!([1])), &json!([2, 3])).unwrap();
        assert_eq!(merged, json!([1, 2, 3]));
    }

    #[test]
    fn non_sequence_current_is_rejected() {
        let r = AppendValues;
        let err = r.apply(Some(&json!(42)), &json!("x")).unwrap_err();
        assert!(err.contains("number"));
    }
}
