use serde_json::Value;

use super::ValueReducer;

/// Replaces the current value with the update. The default for any field
/// without a registered reducer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Overwrite;

impl ValueReducer for Overwrite {
    fn apply(&self, _current: Option<&Value>, update: &Value) -> Result<Value, String> {
        Ok(update.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replaces_whatever_was_there() {
        let r = Overwrite;
        assert_eq!(r.apply(Some(&json!(1)), &json!(2)).unwrap(), json!(2));
        assert_eq!(r.apply(None, &json!("x")).unwrap(), json!("x"));
    }
}
