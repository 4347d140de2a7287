//! Message values used by the message-list merge strategy.
//!
//! Messages are the conventional payload of conversational workflows: nodes
//! append or revise them, and the [`UpsertMessages`](crate::reducers::UpsertMessages)
//! reducer merges parallel updates by message id. The runtime itself never
//! inspects message contents; this type exists so graphs that carry chat
//! history have a stable shape to reduce over.
//!
//! # Examples
//!
//! ```
//! use stategraph::message::Message;
//!
//! let user_msg = Message::user("What's the weather like?");
//! let assistant_msg = Message::assistant("Sunny, 24°C.");
//!
//! assert!(user_msg.has_role(Message::USER));
//! assert_ne!(user_msg.id, assistant_msg.id);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message in a conversation: a stable id, a role, and text content.
///
/// The id is what the upsert merge strategy keys on: two updates carrying
/// the same id collapse to the later one, everything else appends.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier, unique within a conversation.
    #[serde(default)]
    pub id: String,
    /// The role of the message sender (e.g., "user", "assistant", "system").
    ///
    /// Use the constants on [`Message`] for standardized values.
    pub role: String,
    /// The text content of the message.
    pub content: String,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// AI assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a new message with a fresh id and the given role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a message with an explicit id, for upsert-style revisions.
    ///
    /// # Examples
    /// ```
    /// use stategraph::message::Message;
    ///
    /// let draft = Message::with_id("m1", Message::ASSISTANT, "thinking...");
    /// let fixed = Message::with_id("m1", Message::ASSISTANT, "final answer");
    /// assert_eq!(draft.id, fixed.id);
    /// ```
    #[must_use]
    pub fn with_id(id: &str, role: &str, content: &str) -> Self {
        Self {
            id: id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user message with the specified content.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    /// Projects this message into a JSON value, the shape map-state fields
    /// store and the message merge strategy operates on.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "role": self.role,
            "content": self.content,
        })
    }

    /// Parses a message back out of its JSON projection.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_sets_fields() {
        let msg = Message::with_id("m1", "user", "hello");
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn convenience_constructors() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, Message::USER);
        assert_eq!(user_msg.content, "Hello");
        assert!(!user_msg.id.is_empty());

        let assistant_msg = Message::assistant("Hi there!");
        assert_eq!(assistant_msg.role, Message::ASSISTANT);

        let system_msg = Message::system("You are helpful");
        assert_eq!(system_msg.role, Message::SYSTEM);

        let custom_msg = Message::new("function", "Result: 42");
        assert_eq!(custom_msg.role, "function");
    }

    #[test]
    fn fresh_ids_are_unique() {
        let a = Message::user("x");
        let b = Message::user("x");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn role_checking() {
        let user_msg = Message::user("Hello");
        assert!(user_msg.has_role(Message::USER));
        assert!(!user_msg.has_role(Message::ASSISTANT));

        let custom_msg = Message::new("function", "result");
        assert!(custom_msg.has_role("function"));
        assert!(!custom_msg.has_role(Message::SYSTEM));
    }

    #[test]
    fn value_round_trip() {
        let original = Message::with_id("m7", Message::ASSISTANT, "Test message");
        let value = original.to_value();
        assert_eq!(value["id"], "m7");
        let parsed = Message::from_value(&value).expect("parse back");
        assert_eq!(original, parsed);
    }

    #[test]
    fn deserializes_without_id() {
        let parsed: Message =
            serde_json::from_str(r#"{"role":"user","content":"hi"}"#).expect("parse");
        assert!(parsed.id.is_empty());
        assert_eq!(parsed.content, "hi");
    }
}
