//! Output targets for the event bus.
//!
//! Sinks consume full [`Event`] objects and decide how to render or forward
//! them. The bus hands each sink its own worker task, so a sink may perform
//! blocking I/O without stalling execution.

use std::any::type_name;
use std::io::{self, Result as IoResult, Stdout, Write};
use std::sync::Arc;

use parking_lot::Mutex as ParkingMutex;
use serde::Serialize;

use super::event::Event;
use crate::telemetry::{PlainFormatter, TelemetryFormatter};

/// Abstraction over an output target that consumes full event objects.
pub trait EventSink<S>: Send + Sync {
    /// Handle a structured event. The sink decides how to serialize/format it.
    fn handle(&mut self, event: &Event<S>) -> IoResult<()>;

    /// A stable, human-friendly identifier for this sink instance.
    fn name(&self) -> String {
        type_name::<Self>().to_string()
    }
}

/// Stdout sink with pluggable formatting.
pub struct StdOutSink<F: TelemetryFormatter = PlainFormatter> {
    handle: Stdout,
    formatter: F,
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self {
            handle: io::stdout(),
            formatter: PlainFormatter::new(),
        }
    }
}

impl<F: TelemetryFormatter> StdOutSink<F> {
    pub fn with_formatter(formatter: F) -> Self {
        Self {
            handle: io::stdout(),
            formatter,
        }
    }
}

impl<S, F: TelemetryFormatter + Send + Sync> EventSink<S> for StdOutSink<F> {
    fn handle(&mut self, event: &Event<S>) -> IoResult<()> {
        let rendered = self.formatter.render_line(&event.describe());
        self.handle.write_all(rendered.as_bytes())?;
        self.handle.flush()
    }
}

/// In-memory sink for testing and snapshots.
#[derive(Clone)]
pub struct MemorySink<S> {
    entries: Arc<ParkingMutex<Vec<Event<S>>>>,
}

impl<S> Default for MemorySink<S> {
    fn default() -> Self {
        Self {
            entries: Arc::new(ParkingMutex::new(Vec::new())),
        }
    }
}

impl<S: Clone> MemorySink<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured events. Clones the internal buffer so
    /// callers can inspect state without holding the mutex.
    pub fn snapshot(&self) -> Vec<Event<S>> {
        self.entries.lock().clone()
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<S: Clone + Send + Sync> EventSink<S> for MemorySink<S> {
    fn handle(&mut self, event: &Event<S>) -> IoResult<()> {
        self.entries.lock().push(event.clone());
        Ok(())
    }
}

/// Forwards events into a flume channel, e.g. toward an SSE or websocket
/// handler owned by the caller.
pub struct ChannelSink<S> {
    tx: flume::Sender<Event<S>>,
}

impl<S> ChannelSink<S> {
    pub fn new(tx: flume::Sender<Event<S>>) -> Self {
        Self { tx }
    }
}

impl<S: Clone + Send + Sync> EventSink<S> for ChannelSink<S> {
    fn handle(&mut self, event: &Event<S>) -> IoResult<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "event channel disconnected"))
    }
}

/// JSON Lines sink for machine-readable structured logging.
///
/// One JSON object per line using the normalized event envelope, suitable
/// for log aggregation and automated assertions.
pub struct JsonLinesSink {
    handle: Box<dyn Write + Send + Sync>,
    pretty: bool,
}

impl JsonLinesSink {
    pub fn new(handle: Box<dyn Write + Send + Sync>) -> Self {
        Self {
            handle,
            pretty: false,
        }
    }

    pub fn to_stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Pretty-printed output; not valid JSONL, but human-readable.
    pub fn with_pretty_print(handle: Box<dyn Write + Send + Sync>) -> Self {
        Self {
            handle,
            pretty: true,
        }
    }
}

impl<S: Serialize> EventSink<S> for JsonLinesSink {
    fn handle(&mut self, event: &Event<S>) -> IoResult<()> {
        let value = event.to_json_value().map_err(io::Error::other)?;
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&value).map_err(io::Error::other)?
        } else {
            serde_json::to_string(&value).map_err(io::Error::other)?
        };
        self.handle.write_all(rendered.as_bytes())?;
        self.handle.write_all(b"\n")?;
        self.handle.flush()
    }
}
