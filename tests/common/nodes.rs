#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use stategraph::node::{Node, NodeContext, NodeError, NodeOutput};
use stategraph::reducers::{MapState, map_state};

/// Appends its tag to the `messages` field and counts invocations.
#[derive(Clone)]
pub struct TagNode {
    pub tag: &'static str,
    pub runs: Arc<AtomicUsize>,
}

impl TagNode {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Node<MapState> for TagNode {
    async fn run(
        &self,
        _state: MapState,
        _ctx: NodeContext<MapState>,
    ) -> Result<NodeOutput<MapState>, NodeError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(NodeOutput::update(map_state([(
            "messages",
            json!(self.tag),
        )])))
    }
}

/// Sets a single field to a fixed value.
#[derive(Clone)]
pub struct SetFieldNode {
    pub field: &'static str,
    pub value: Value,
}

impl SetFieldNode {
    pub fn new(field: &'static str, value: Value) -> Self {
        Self { field, value }
    }
}

#[async_trait]
impl Node<MapState> for SetFieldNode {
    async fn run(
        &self,
        _state: MapState,
        _ctx: NodeContext<MapState>,
    ) -> Result<NodeOutput<MapState>, NodeError> {
        Ok(NodeOutput::update(map_state([(
            self.field,
            self.value.clone(),
        )])))
    }
}

/// Applies an integer operation to the `value` field.
#[derive(Clone, Copy)]
pub enum ValueOp {
    Add(i64),
    Mul(i64),
}

pub struct ValueOpNode {
    pub op: ValueOp,
}

impl ValueOpNode {
    pub fn add(amount: i64) -> Self {
        Self {
            op: ValueOp::Add(amount),
        }
    }

    pub fn mul(factor: i64) -> Self {
        Self {
            op: ValueOp::Mul(factor),
        }
    }
}

#[async_trait]
impl Node<MapState> for ValueOpNode {
    async fn run(
        &self,
        state: MapState,
        _ctx: NodeContext<MapState>,
    ) -> Result<NodeOutput<MapState>, NodeError> {
        let current = state
            .get("value")
            .and_then(Value::as_i64)
            .ok_or(NodeError::MissingInput { what: "value" })?;
        let updated = match self.op {
            ValueOp::Add(amount) => current + amount,
            ValueOp::Mul(factor) => current * factor,
        };
        Ok(NodeOutput::update(map_state([("value", json!(updated))])))
    }
}

/// Reads the `value` field from a map state.
pub fn value_of(state: &MapState) -> i64 {
    state.get("value").and_then(Value::as_i64).unwrap_or(0)
}

/// Reads the `messages` field as a vector of strings.
pub fn messages_of(state: &MapState) -> Vec<String> {
    state
        .get("messages")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
