//! Per-invocation configuration and cooperative cancellation.

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::watch;

/// Conventional `configurable` key identifying a persistent conversation.
pub const THREAD_ID_KEY: &str = "thread_id";
/// Conventional `configurable` key selecting a specific snapshot.
pub const CHECKPOINT_ID_KEY: &str = "checkpoint_id";

/// Options passed per invocation.
///
/// The `configurable` map conventionally carries
/// [`THREAD_ID_KEY`] and [`CHECKPOINT_ID_KEY`]; the typed accessors read
/// those. The interrupt and resume fields drive the interrupt protocol;
/// `cancel` and `node_timeout` bound execution.
#[derive(Clone, Debug, Default)]
pub struct RunConfig {
    /// Free-form invocation parameters, visible to nodes through the context.
    pub configurable: FxHashMap<String, Value>,
    /// Caller tags, recorded into checkpoint metadata.
    pub tags: Vec<String>,
    /// Caller metadata, recorded into checkpoint metadata.
    pub metadata: FxHashMap<String, Value>,
    /// Pause before any of these nodes runs.
    pub interrupt_before: Vec<String>,
    /// Pause after any of these nodes ran.
    pub interrupt_after: Vec<String>,
    /// Initial frontier override, used to resume a paused run.
    pub resume_from: Vec<String>,
    /// Value handed back to the node that raised a dynamic interrupt.
    pub resume_value: Option<Value>,
    /// Per-node wall-clock bound.
    pub node_timeout: Option<Duration>,
    /// Cooperative cancellation signal.
    pub cancel: Option<CancelToken>,
}

impl RunConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Config that only names the persistent conversation.
    #[must_use]
    pub fn with_thread_id(thread_id: impl Into<String>) -> Self {
        Self::new().thread_id(thread_id)
    }

    /// Config that pauses around the given nodes.
    #[must_use]
    pub fn with_interrupts<I, J>(before: I, after: J) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        let mut config = Self::new();
        config.interrupt_before = before.into_iter().collect();
        config.interrupt_after = after.into_iter().collect();
        config
    }

    #[must_use]
    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.configurable
            .insert(THREAD_ID_KEY.to_string(), Value::String(thread_id.into()));
        self
    }

    #[must_use]
    pub fn checkpoint_id(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.configurable.insert(
            CHECKPOINT_ID_KEY.to_string(),
            Value::String(checkpoint_id.into()),
        );
        self
    }

    #[must_use]
    pub fn configurable(mut self, key: impl Into<String>, value: Value) -> Self {
        self.configurable.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn resume_from<I, T>(mut self, frontier: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.resume_from = frontier.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn resume_value(mut self, value: Value) -> Self {
        self.resume_value = Some(value);
        self
    }

    #[must_use]
    pub fn node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The persistent-conversation identifier, when one was supplied.
    #[must_use]
    pub fn get_thread_id(&self) -> Option<&str> {
        self.configurable.get(THREAD_ID_KEY).and_then(Value::as_str)
    }

    /// The explicit snapshot identifier, when one was supplied.
    #[must_use]
    pub fn get_checkpoint_id(&self) -> Option<&str> {
        self.configurable
            .get(CHECKPOINT_ID_KEY)
            .and_then(Value::as_str)
    }
}

/// Cooperative cancellation handle.
///
/// Cloning shares the same signal. Cancellation is advisory: in-flight nodes
/// observe it through their context and are expected to return promptly; the
/// step loop and retry sleeps abort at their next check.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when the token is cancelled; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without firing; nothing will ever cancel us.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
