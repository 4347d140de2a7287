//! Event schema for node-level and graph-level notifications.

use std::fmt;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A notification emitted during graph execution.
///
/// Node-scoped variants bracket a single node's run; graph-scoped variants
/// bracket the invocation and its steps. [`Event::Llm`] is a pass-through
/// for model-streaming collaborators; the runtime forwards these without
/// interpreting them.
///
/// The state parameter `S` appears only on the variants that snapshot state
/// ([`Event::Step`] and [`Event::ChainEnd`]).
#[derive(Clone, Debug, PartialEq)]
pub enum Event<S> {
    /// The invocation started with the given initial frontier.
    ChainStart { entry: Vec<String> },
    /// The invocation finished normally with the final state.
    ChainEnd { state: S },
    /// The invocation aborted with an error.
    ChainError { error: String },
    /// A step completed: label, merged state, and the next frontier.
    Step {
        label: String,
        step: u64,
        state: S,
        next: Vec<String>,
    },
    /// A node is about to run.
    NodeStart { node: String, step: u64 },
    /// A node reported progress mid-run.
    NodeProgress {
        node: String,
        step: u64,
        scope: String,
        message: String,
    },
    /// A node finished successfully.
    NodeComplete { node: String, step: u64 },
    /// A node failed (after retries, if any were configured).
    NodeError {
        node: String,
        step: u64,
        error: String,
    },
    /// Model-streaming pass-through from external collaborators.
    Llm(LlmEvent),
}

impl<S> Event<S> {
    /// Stable tag for the variant, used by sinks and stream filters.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ChainStart { .. } => "chain_start",
            Event::ChainEnd { .. } => "chain_end",
            Event::ChainError { .. } => "chain_error",
            Event::Step { .. } => "step",
            Event::NodeStart { .. } => "node_start",
            Event::NodeProgress { .. } => "node_progress",
            Event::NodeComplete { .. } => "node_complete",
            Event::NodeError { .. } => "node_error",
            Event::Llm(_) => "llm",
        }
    }

    /// The node this event concerns, when it is node-scoped.
    #[must_use]
    pub fn node(&self) -> Option<&str> {
        match self {
            Event::NodeStart { node, .. }
            | Event::NodeProgress { node, .. }
            | Event::NodeComplete { node, .. }
            | Event::NodeError { node, .. } => Some(node),
            Event::Llm(llm) => llm.node.as_deref(),
            _ => None,
        }
    }

    /// `true` once this event marks the end of an invocation's stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::ChainEnd { .. } | Event::ChainError { .. })
    }

    /// One-line human rendering without the state payload.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Event::ChainStart { entry } => format!("chain start -> {}", entry.join("+")),
            Event::ChainEnd { .. } => "chain end".to_string(),
            Event::ChainError { error } => format!("chain error: {error}"),
            Event::Step { label, step, next, .. } => {
                format!("step {step} [{label}] -> {}", next.join("+"))
            }
            Event::NodeStart { node, step } => format!("[{node}@{step}] start"),
            Event::NodeProgress {
                node,
                step,
                scope,
                message,
            } => format!("[{node}@{step}] {scope}: {message}"),
            Event::NodeComplete { node, step } => format!("[{node}@{step}] complete"),
            Event::NodeError { node, step, error } => format!("[{node}@{step}] error: {error}"),
            Event::Llm(llm) => llm.describe(),
        }
    }
}

impl<S: Serialize> Event<S> {
    /// Structured JSON projection with a normalized envelope:
    /// `{ "kind", "timestamp", ...variant fields }`.
    pub fn to_json_value(&self) -> Result<Value, serde_json::Error> {
        use serde_json::json;

        let body = match self {
            Event::ChainStart { entry } => json!({ "entry": entry }),
            Event::ChainEnd { state } => json!({ "state": serde_json::to_value(state)? }),
            Event::ChainError { error } => json!({ "error": error }),
            Event::Step {
                label,
                step,
                state,
                next,
            } => json!({
                "label": label,
                "step": step,
                "state": serde_json::to_value(state)?,
                "next": next,
            }),
            Event::NodeStart { node, step } => json!({ "node": node, "step": step }),
            Event::NodeProgress {
                node,
                step,
                scope,
                message,
            } => json!({ "node": node, "step": step, "scope": scope, "message": message }),
            Event::NodeComplete { node, step } => json!({ "node": node, "step": step }),
            Event::NodeError { node, step, error } => {
                json!({ "node": node, "step": step, "error": error })
            }
            Event::Llm(llm) => serde_json::to_value(llm)?,
        };

        let mut envelope = serde_json::Map::new();
        envelope.insert("kind".to_string(), json!(self.kind()));
        envelope.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
        if let Value::Object(fields) = body {
            envelope.extend(fields);
        }
        Ok(Value::Object(envelope))
    }
}

impl<S> fmt::Display for Event<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Model-streaming chunk forwarded from an external collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LlmEvent {
    pub node: Option<String>,
    pub stream_id: Option<String>,
    pub chunk: String,
    pub is_final: bool,
    #[serde(default)]
    pub metadata: FxHashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl LlmEvent {
    pub fn chunk(node: Option<String>, stream_id: Option<String>, chunk: impl Into<String>) -> Self {
        Self {
            node,
            stream_id,
            chunk: chunk.into(),
            is_final: false,
            metadata: FxHashMap::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn final_chunk(
        node: Option<String>,
        stream_id: Option<String>,
        chunk: impl Into<String>,
    ) -> Self {
        Self {
            is_final: true,
            ..Self::chunk(node, stream_id, chunk)
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: FxHashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match (&self.stream_id, &self.node) {
            (Some(stream), _) => format!("[llm {stream}] {}", self.chunk),
            (None, Some(node)) => format!("[llm {node}] {}", self.chunk),
            (None, None) => format!("[llm] {}", self.chunk),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let e: Event<()> = Event::NodeStart {
            node: "a".into(),
            step: 1,
        };
        assert_eq!(e.kind(), "node_start");
        assert_eq!(e.node(), Some("a"));
        assert!(!e.is_terminal());

        let done: Event<()> = Event::ChainEnd { state: () };
        assert!(done.is_terminal());
    }

    #[test]
    fn json_projection_carries_envelope() {
        let e: Event<i64> = Event::Step {
            label: "a+b".into(),
            step: 2,
            state: 7,
            next: vec!["c".into()],
        };
        let value = e.to_json_value().unwrap();
        assert_eq!(value["kind"], "step");
        assert_eq!(value["label"], "a+b");
        assert_eq!(value["state"], 7);
    }

    #[test]
    fn llm_describe_prefers_stream_id() {
        let e = LlmEvent::chunk(Some("writer".into()), Some("s1".into()), "tok");
        assert!(e.describe().contains("s1"));
    }
}
