//! Streaming execution: a lazy sequence of events over a bounded buffer.
//!
//! [`Runnable::stream`] spawns the run on its own task and hands back a
//! [`RunStream`] that yields events filtered by [`StreamMode`]. The buffer
//! is bounded: a consumer that falls behind loses events (counted, visible
//! through [`RunStream::dropped`]) instead of stalling execution. The
//! stream is finite and non-restartable: it ends when the run completes,
//! errors, pauses on an interrupt, or is cancelled.

use crate::event_bus::{Event, EventBus, EventStream};
use crate::graph::Runnable;
use crate::runtime::{RunConfig, RunError};

/// Which events a stream consumer receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// Per-step full-state events only.
    #[default]
    Values,
    /// Per-node completion events.
    Updates,
    /// Model-streaming pass-through events.
    Messages,
    /// Everything.
    Debug,
}

impl StreamMode {
    fn accepts<S>(self, event: &Event<S>) -> bool {
        match self {
            StreamMode::Values => matches!(event, Event::Step { .. }),
            StreamMode::Updates => {
                matches!(event, Event::NodeComplete { .. } | Event::NodeError { .. })
            }
            StreamMode::Messages => matches!(event, Event::Llm(_)),
            StreamMode::Debug => true,
        }
    }
}

/// Progress snapshot of a streaming run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Steps observed so far.
    pub steps: u64,
    /// Label of the most recent step.
    pub last_label: Option<String>,
    /// Events dropped because the consumer lagged.
    pub dropped_events: usize,
}

/// A running invocation plus its filtered event sequence.
pub struct RunStream<S: Send + Sync + 'static> {
    events: EventStream<S>,
    mode: StreamMode,
    handle: tokio::task::JoinHandle<Result<S, RunError<S>>>,
    steps: u64,
    last_label: Option<String>,
}

impl<S: Clone + Send + Sync + 'static> RunStream<S> {
    /// Next event matching the stream mode; `None` once the run has ended
    /// and the buffer is drained.
    pub async fn next(&mut self) -> Option<Event<S>> {
        while let Some(event) = self.events.recv().await {
            if let Event::Step { label, step, .. } = &event {
                self.steps = (*step).max(self.steps);
                self.last_label = Some(label.clone());
            }
            if self.mode.accepts(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Events dropped so far due to consumer lag.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.events.dropped()
    }

    /// Progress snapshot based on the events observed so far.
    #[must_use]
    pub fn report(&self) -> RunReport {
        RunReport {
            steps: self.steps,
            last_label: self.last_label.clone(),
            dropped_events: self.dropped(),
        }
    }

    /// Waits for the run itself and returns its outcome, discarding any
    /// events not yet consumed.
    pub async fn join(self) -> Result<S, RunError<S>> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(join) => Err(RunError::Join(join)),
        }
    }
}

impl<S: Clone + Send + Sync + 'static> Runnable<S> {
    /// Runs the graph on a background task and returns its event stream.
    ///
    /// Must be called within a tokio runtime.
    pub fn stream(&self, initial: S, config: RunConfig, mode: StreamMode) -> RunStream<S> {
        let bus = EventBus::from_config(self.bus_config());
        bus.start();
        let events = bus.subscribe();
        let graph = self.clone();
        let handle = tokio::spawn(async move {
            let result =
                crate::runtime::scheduler::run_loop(&graph, initial, &config, bus.emitter()).await;
            bus.shutdown().await;
            result
        });
        RunStream {
            events,
            mode,
            handle,
            steps: 0,
            last_label: None,
        }
    }
}
