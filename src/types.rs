//! Core identifiers shared across the runtime.
//!
//! Graphs address their nodes by plain string names. Two names are special:
//! the entry point is whatever the builder declares, and [`END`] is the
//! reserved terminal sentinel that never has a node body. Everything else in
//! this module is bookkeeping around those names: step labels for composite
//! frontiers and the identifier handed out for listener registrations.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Reserved terminal sentinel.
///
/// An edge may target `END`; a conditional edge or a command `goto` may
/// return it. Reaching a frontier that contains only `END` finishes the run.
/// Registering a node under this name is rejected at compile time.
pub const END: &str = "END";

/// Returns `true` for the reserved terminal sentinel.
#[must_use]
pub fn is_end(name: &str) -> bool {
    name == END
}

/// Label attached to a completed step.
///
/// A single-node step is labelled with that node's name; a fan-out step gets
/// a composite label joining the names that ran, in submission order. The
/// label is what checkpoint records carry as `node_name` and what step
/// listeners receive.
#[must_use]
pub fn step_label(ran: &[String]) -> String {
    match ran {
        [only] => only.clone(),
        many => many.join("+"),
    }
}

/// Opaque handle for a listener registration.
///
/// Listeners are added and removed dynamically; removal is by id rather than
/// by closure equality. Ids are unique for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}
