//! Broadcast hub behind the event bus.
//!
//! A bounded tokio broadcast channel fans events out to however many
//! subscribers exist (sink workers, stream consumers). A slow subscriber
//! lags rather than blocking the producer; lagged events are dropped and
//! counted, and the counter is queryable for diagnostics.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio::time::timeout;

use super::emitter::{EmitterError, EventEmitter};
use super::event::Event;

/// Snapshot of hub health for monitoring and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHubMetrics {
    /// Maximum number of events buffered per subscriber before lag occurs.
    pub capacity: usize,
    /// Total count of events dropped due to slow subscribers.
    pub dropped: usize,
}

#[derive(Debug)]
pub struct EventHub<S> {
    sender: RwLock<Option<Sender<Event<S>>>>,
    dropped_events: AtomicUsize,
    capacity: usize,
}

impl<S: Clone + Send + 'static> EventHub<S> {
    /// Create a new hub backed by a tokio broadcast channel.
    ///
    /// `capacity` is clamped to at least 1 to satisfy the broadcast API.
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Arc::new(Self {
            sender: RwLock::new(Some(sender)),
            dropped_events: AtomicUsize::new(0),
            capacity,
        })
    }

    /// Publish an event to all subscribers.
    ///
    /// Publishing with no subscribers is a no-op; publishing after
    /// [`close`](Self::close) returns [`EmitterError::Closed`].
    pub fn publish(&self, event: Event<S>) -> Result<(), EmitterError> {
        match self.current_sender() {
            // A send error just means there are no receivers right now.
            Some(sender) => {
                let _ = sender.send(event);
                Ok(())
            }
            None => Err(EmitterError::Closed),
        }
    }

    /// Subscribe to a fresh receiver.
    ///
    /// If the hub has already been closed, this returns a receiver that
    /// reports closed immediately, keeping downstream code simple.
    pub fn subscribe(self: &Arc<Self>) -> EventStream<S> {
        let receiver = self
            .current_sender()
            .map(|sender| sender.subscribe())
            .unwrap_or_else(|| {
                let (sender, receiver) = broadcast::channel(self.capacity.max(1));
                drop(sender);
                receiver
            });
        EventStream {
            receiver,
            hub: Arc::clone(self),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> usize {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> EventHubMetrics {
        EventHubMetrics {
            capacity: self.capacity(),
            dropped: self.dropped(),
        }
    }

    pub fn emitter(self: &Arc<Self>) -> HubEmitter<S> {
        HubEmitter {
            hub: Arc::clone(self),
        }
    }

    /// Close the hub and signal all subscribers that no further events will arrive.
    pub fn close(&self) {
        let _ = self.sender.write().take();
    }

    fn current_sender(&self) -> Option<Sender<Event<S>>> {
        self.sender.read().clone()
    }

    fn record_lag(&self, missed: u64) {
        if missed == 0 {
            return;
        }
        let increment = usize::try_from(missed).unwrap_or(usize::MAX);
        let total = self
            .dropped_events
            .fetch_add(increment, Ordering::Relaxed)
            .saturating_add(increment);
        tracing::warn!(
            target: "stategraph::event_bus",
            missed,
            total_dropped = total,
            "event stream lagged; dropped events"
        );
    }
}

pub struct HubEmitter<S> {
    hub: Arc<EventHub<S>>,
}

impl<S> Clone for HubEmitter<S> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<S> std::fmt::Debug for HubEmitter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubEmitter").finish()
    }
}

impl<S: Clone + Send + 'static> EventEmitter<S> for HubEmitter<S> {
    fn emit(&self, event: Event<S>) -> Result<(), EmitterError> {
        self.hub.publish(event)
    }
}

/// Receiver half of the hub: yields events until the hub closes.
#[derive(Debug)]
pub struct EventStream<S> {
    receiver: Receiver<Event<S>>,
    hub: Arc<EventHub<S>>,
}

impl<S: Clone + Send + 'static> EventStream<S> {
    /// Receive the next event, skipping over lag gaps (which are counted
    /// on the hub's dropped-events metric).
    pub async fn recv(&mut self) -> Option<Event<S>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.hub.record_lag(missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Event<S>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    self.hub.record_lag(missed);
                    continue;
                }
                Err(_) => return None,
            }
        }
    }

    /// Receive with a deadline; `None` on timeout or when the hub closes.
    pub async fn next_timeout(&mut self, duration: Duration) -> Option<Event<S>> {
        match timeout(duration, self.recv()).await {
            Ok(event) => event,
            Err(_) => None,
        }
    }

    /// Dropped-event count observed by the backing hub.
    pub fn dropped(&self) -> usize {
        self.hub.dropped()
    }

    /// Convert into a boxed async stream for use with combinators.
    pub fn into_async_stream(self) -> BoxStream<'static, Event<S>> {
        stream::unfold(self, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        })
        .boxed()
    }
}
