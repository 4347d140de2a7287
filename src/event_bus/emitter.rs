use thiserror::Error;

use super::event::Event;

/// Abstract event emitter handed to nodes and the step loop.
///
/// Emission is synchronous and non-blocking; a full buffer drops the event
/// at the hub rather than stalling execution.
pub trait EventEmitter<S>: Send + Sync {
    fn emit(&self, event: Event<S>) -> Result<(), EmitterError>;
}

/// Errors that can occur when emitting an event.
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("event hub closed")]
    Closed,
    #[error("event emission failed: {0}")]
    Other(String),
}

/// Emitter that discards everything. Used when an invocation has no bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl<S> EventEmitter<S> for NullEmitter {
    fn emit(&self, _event: Event<S>) -> Result<(), EmitterError> {
        Ok(())
    }
}
