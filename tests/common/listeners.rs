#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use stategraph::event_bus::{GraphListener, ListenerError};
use stategraph::reducers::MapState;

/// Records every notification it receives, in arrival order.
#[derive(Clone, Default)]
pub struct RecordingListener {
    pub entries: Arc<Mutex<Vec<String>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl GraphListener<MapState> for RecordingListener {
    async fn on_node_start(&self, node: &str, step: u64) -> Result<(), ListenerError> {
        self.entries.lock().push(format!("start:{node}@{step}"));
        Ok(())
    }

    async fn on_node_complete(&self, node: &str, step: u64) -> Result<(), ListenerError> {
        self.entries.lock().push(format!("complete:{node}@{step}"));
        Ok(())
    }

    async fn on_node_error(&self, node: &str, step: u64, _error: &str) -> Result<(), ListenerError> {
        self.entries.lock().push(format!("error:{node}@{step}"));
        Ok(())
    }

    async fn on_chain_start(&self, _state: &MapState) -> Result<(), ListenerError> {
        self.entries.lock().push("chain_start".to_string());
        Ok(())
    }

    async fn on_chain_end(&self, _state: &MapState) -> Result<(), ListenerError> {
        self.entries.lock().push("chain_end".to_string());
        Ok(())
    }

    async fn on_chain_error(&self, _error: &str) -> Result<(), ListenerError> {
        self.entries.lock().push("chain_error".to_string());
        Ok(())
    }

    async fn on_step(
        &self,
        label: &str,
        _state: &MapState,
        step: u64,
        _next: &[String],
    ) -> Result<(), ListenerError> {
        self.entries.lock().push(format!("step:{label}@{step}"));
        Ok(())
    }
}
