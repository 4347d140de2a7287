//! Event notifications for workflow execution.
//!
//! Two delivery paths share one event schema:
//!
//! - **Listeners** ([`GraphListener`], [`ListenerSet`]) are awaited inline by
//!   the step loop and node executor. This path is ordered and synchronous
//!   relative to execution; it is what the checkpoint layer hooks.
//! - **The bus** ([`EventBus`], [`EventHub`]) broadcasts [`Event`]s through a
//!   bounded buffer to sinks and stream consumers. A slow consumer drops
//!   events (counted, queryable) rather than stalling the run.

mod bus;
mod emitter;
mod event;
mod hub;
mod listeners;
mod sink;

pub use bus::{EventBus, EventBusConfig};
pub use emitter::{EmitterError, EventEmitter, NullEmitter};
pub use event::{Event, LlmEvent};
pub use hub::{EventHub, EventHubMetrics, EventStream, HubEmitter};
pub use listeners::{GraphListener, ListenerError, ListenerSet};
pub use sink::{ChannelSink, EventSink, JsonLinesSink, MemorySink, StdOutSink};
