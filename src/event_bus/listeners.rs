//! Listener registrations and notification fan-out.
//!
//! Listeners observe execution inline: the step loop awaits every graph
//! listener before a step is considered complete, which is what lets the
//! checkpoint layer guarantee a snapshot exists before the step returns.
//! Listener failures (including panics) are logged and swallowed; they
//! never alter the run's outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::RwLock;
use thiserror::Error;

use crate::types::ListenerId;

/// Failure reported by a listener callback.
///
/// Reported failures are logged by the runtime and otherwise ignored.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ListenerError {
    pub message: String,
}

impl ListenerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Observer for node-level and graph-level execution events.
///
/// All methods default to no-ops so implementations override only what they
/// need. Node events fire from inside the node executor; graph events fire
/// from the step loop, with `on_step` awaited before the step returns.
#[async_trait]
pub trait GraphListener<S: Send + Sync + 'static>: Send + Sync {
    async fn on_node_start(&self, _node: &str, _step: u64) -> Result<(), ListenerError> {
        Ok(())
    }

    async fn on_node_progress(
        &self,
        _node: &str,
        _step: u64,
        _scope: &str,
        _message: &str,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    async fn on_node_complete(&self, _node: &str, _step: u64) -> Result<(), ListenerError> {
        Ok(())
    }

    async fn on_node_error(
        &self,
        _node: &str,
        _step: u64,
        _error: &str,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    async fn on_chain_start(&self, _state: &S) -> Result<(), ListenerError> {
        Ok(())
    }

    async fn on_chain_end(&self, _state: &S) -> Result<(), ListenerError> {
        Ok(())
    }

    async fn on_chain_error(&self, _error: &str) -> Result<(), ListenerError> {
        Ok(())
    }

    /// A step completed: `label` names what ran, `state` is the merged
    /// result, `next` is the frontier the loop will take up next.
    async fn on_step(
        &self,
        _label: &str,
        _state: &S,
        _step: u64,
        _next: &[String],
    ) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Registry of listeners keyed by registration id.
///
/// Reads take the lock only long enough to clone the listener handles;
/// notification awaits happen outside it. Adds and removes take the write
/// lock.
pub struct ListenerSet<S: Send + Sync + 'static> {
    entries: RwLock<Vec<(ListenerId, Arc<dyn GraphListener<S>>)>>,
}

impl<S: Send + Sync + 'static> Default for ListenerSet<S> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<S: Send + Sync + 'static> ListenerSet<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns the id to remove it with.
    pub fn add(&self, listener: Arc<dyn GraphListener<S>>) -> ListenerId {
        let id = ListenerId::next();
        self.entries.write().push((id, listener));
        id
    }

    /// Removes a registration; unknown ids are ignored.
    pub fn remove(&self, id: ListenerId) {
        self.entries.write().retain(|(entry_id, _)| *entry_id != id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn GraphListener<S>>> {
        self.entries
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    pub async fn notify_node_start(&self, node: &str, step: u64) {
        for listener in self.snapshot() {
            guard(AssertUnwindSafe(listener.on_node_start(node, step)).catch_unwind().await);
        }
    }

    pub async fn notify_node_progress(&self, node: &str, step: u64, scope: &str, message: &str) {
        for listener in self.snapshot() {
            guard(
                AssertUnwindSafe(listener.on_node_progress(node, step, scope, message))
                    .catch_unwind()
                    .await,
            );
        }
    }

    pub async fn notify_node_complete(&self, node: &str, step: u64) {
        for listener in self.snapshot() {
            guard(
                AssertUnwindSafe(listener.on_node_complete(node, step))
                    .catch_unwind()
                    .await,
            );
        }
    }

    pub async fn notify_node_error(&self, node: &str, step: u64, error: &str) {
        for listener in self.snapshot() {
            guard(
                AssertUnwindSafe(listener.on_node_error(node, step, error))
                    .catch_unwind()
                    .await,
            );
        }
    }

    pub async fn notify_chain_start(&self, state: &S) {
        for listener in self.snapshot() {
            guard(AssertUnwindSafe(listener.on_chain_start(state)).catch_unwind().await);
        }
    }

    pub async fn notify_chain_end(&self, state: &S) {
        for listener in self.snapshot() {
            guard(AssertUnwindSafe(listener.on_chain_end(state)).catch_unwind().await);
        }
    }

    pub async fn notify_chain_error(&self, error: &str) {
        for listener in self.snapshot() {
            guard(AssertUnwindSafe(listener.on_chain_error(error)).catch_unwind().await);
        }
    }

    pub async fn notify_step(&self, label: &str, state: &S, step: u64, next: &[String]) {
        for listener in self.snapshot() {
            guard(
                AssertUnwindSafe(listener.on_step(label, state, step, next))
                    .catch_unwind()
                    .await,
            );
        }
    }
}

fn guard(outcome: Result<Result<(), ListenerError>, Box<dyn std::any::Any + Send>>) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::warn!(target: "stategraph::listeners", error = %err, "listener reported failure");
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(target: "stategraph::listeners", panic = %message, "listener panicked");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
