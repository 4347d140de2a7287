//! Event broadcasting for workflow execution.
//!
//! An [`EventBus`] owns the broadcast hub and a set of sinks. Each sink gets
//! its own worker task subscribed to the hub, so slow sinks lag (and drop,
//! counted) instead of stalling the step loop. The bus is an invocation-level
//! object: one run, one bus, closed deterministically when the run ends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::{sync::oneshot, task};

use super::emitter::EventEmitter;
use super::hub::{EventHub, EventHubMetrics, EventStream};
use super::sink::{EventSink, StdOutSink};

const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Buffering and default-sink settings carried by a compiled graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBusConfig {
    /// Per-subscriber buffer size; events beyond it are dropped and counted.
    pub buffer_capacity: usize,
    /// Attach a stdout sink to every invocation's bus.
    pub stdout: bool,
}

impl EventBusConfig {
    pub const DEFAULT_BUFFER_CAPACITY: usize = DEFAULT_BUFFER_CAPACITY;

    #[must_use]
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            buffer_capacity: if buffer_capacity == 0 {
                Self::DEFAULT_BUFFER_CAPACITY
            } else {
                buffer_capacity
            },
            stdout: false,
        }
    }

    #[must_use]
    pub fn with_stdout(mut self) -> Self {
        self.stdout = true;
        self
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

/// Central event broadcasting system for one workflow invocation.
pub struct EventBus<S> {
    sinks: Mutex<Vec<SinkEntry<S>>>,
    hub: Arc<EventHub<S>>,
    started: AtomicBool,
}

impl<S: Clone + Send + Sync + 'static> EventBus<S> {
    /// Bus with no sinks; subscribers attach via [`subscribe`](Self::subscribe).
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Vec::new(), DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink<S> + 'static,
    {
        Self::with_sinks(vec![Box::new(sink)])
    }

    pub fn with_sinks(sinks: Vec<Box<dyn EventSink<S>>>) -> Self {
        Self::with_capacity(sinks, DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(sinks: Vec<Box<dyn EventSink<S>>>, buffer_capacity: usize) -> Self {
        let hub = EventHub::new(buffer_capacity);
        let entries = sinks.into_iter().map(SinkEntry::new).collect();
        Self {
            sinks: Mutex::new(entries),
            hub,
            started: AtomicBool::new(false),
        }
    }

    /// Builds a bus from a compiled graph's bus settings.
    pub fn from_config(config: &EventBusConfig) -> Self {
        let mut sinks: Vec<Box<dyn EventSink<S>>> = Vec::new();
        if config.stdout {
            sinks.push(Box::new(StdOutSink::default()));
        }
        Self::with_capacity(sinks, config.buffer_capacity)
    }

    pub fn add_sink<T: EventSink<S> + 'static>(&self, sink: T) {
        self.add_boxed_sink(Box::new(sink));
    }

    pub fn add_boxed_sink(&self, sink: Box<dyn EventSink<S>>) {
        let mut sinks = self.sinks.lock();
        let mut entry = SinkEntry::new(sink);
        if self.started.load(Ordering::SeqCst) {
            entry.spawn_worker(self.hub.clone());
        }
        sinks.push(entry);
    }

    pub fn emitter(&self) -> Arc<dyn EventEmitter<S>> {
        Arc::new(self.hub.emitter())
    }

    pub fn subscribe(&self) -> EventStream<S> {
        self.hub.subscribe()
    }

    pub fn metrics(&self) -> EventHubMetrics {
        self.hub.metrics()
    }

    /// Start sink workers. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut sinks = self.sinks.lock();
        for entry in sinks.iter_mut() {
            entry.spawn_worker(self.hub.clone());
        }
    }

    /// Close the hub; subscribers drain buffered events and then end.
    pub fn close(&self) {
        self.hub.close();
    }

    /// Close the hub and wait for sink workers to finish draining.
    pub async fn shutdown(&self) {
        self.hub.close();
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        let workers: Vec<SinkWorker> = {
            let mut sinks = self.sinks.lock();
            sinks.iter_mut().filter_map(|entry| entry.worker.take()).collect()
        };
        for worker in workers {
            // The hub is closed; the worker exits once it has drained its
            // buffer. Keep the shutdown sender alive until then so the
            // worker is not interrupted mid-drain.
            let _ = worker.handle.await;
            drop(worker.shutdown);
        }
    }
}

impl<S: Clone + Send + Sync + 'static> Default for EventBus<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Drop for EventBus<S> {
    fn drop(&mut self) {
        if self.started.load(Ordering::SeqCst) {
            let mut sinks = self.sinks.lock();
            for entry in sinks.iter_mut() {
                entry.abort_worker();
            }
        }
    }
}

struct SinkEntry<S> {
    sink: Arc<Mutex<Box<dyn EventSink<S>>>>,
    worker: Option<SinkWorker>,
}

impl<S: Clone + Send + Sync + 'static> SinkEntry<S> {
    fn new(sink: Box<dyn EventSink<S>>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            worker: None,
        }
    }

    fn spawn_worker(&mut self, hub: Arc<EventHub<S>>) {
        if self.worker.is_some() {
            return;
        }
        let sink = Arc::clone(&self.sink);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let mut stream = hub.subscribe();
        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    // Drain pending events before honoring a shutdown signal.
                    biased;
                    event = stream.recv() => match event {
                        Some(event) => {
                            let mut guard = sink.lock();
                            if let Err(err) = guard.handle(&event) {
                                tracing::warn!(sink = %guard.name(), error = %err, "event sink failed");
                            }
                        }
                        None => break,
                    },
                    _ = &mut shutdown_rx => break,
                }
            }
        });
        self.worker = Some(SinkWorker {
            shutdown: shutdown_tx,
            handle,
        });
    }
}

impl<S> SinkEntry<S> {
    fn abort_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.shutdown.send(());
            worker.handle.abort();
        }
    }
}

struct SinkWorker {
    shutdown: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}
