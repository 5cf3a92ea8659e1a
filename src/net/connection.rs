//! Connection lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for logs
//! - Count open connections
//! - Finish a graceful shutdown when the last connection closes

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::lifecycle::reactor::{ExitHandle, ExitRequest};

/// Only uniqueness matters, so relaxed ordering is enough.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts open connections and ends the loop once a drain completes.
///
/// Lives on the reactor thread, so plain `Cell`s suffice.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    state: Rc<TrackerState>,
}

#[derive(Debug)]
struct TrackerState {
    active: Cell<u64>,
    draining: Cell<bool>,
    exit: ExitHandle,
}

impl ConnectionTracker {
    pub fn new(exit: ExitHandle) -> Self {
        Self {
            state: Rc::new(TrackerState {
                active: Cell::new(0),
                draining: Cell::new(false),
                exit,
            }),
        }
    }

    /// Record a new connection. The guard closes it on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.state.active.set(self.state.active.get() + 1);
        ConnectionGuard {
            state: Rc::clone(&self.state),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.state.active.get()
    }

    pub fn is_draining(&self) -> bool {
        self.state.draining.get()
    }

    /// Enter draining mode. If nothing is open the loop exits right away,
    /// otherwise the last guard to drop ends it.
    pub fn begin_draining(&self) {
        self.state.draining.set(true);
        if self.state.active.get() == 0 {
            self.state.finish_shutdown();
        }
    }

    pub fn finish_shutdown(&self) {
        self.state.finish_shutdown();
    }
}

impl TrackerState {
    fn finish_shutdown(&self) {
        tracing::debug!("Finishing shutdown");
        self.exit.request_exit();
    }
}

/// Tracks one connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    state: Rc<TrackerState>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.state.active.get().saturating_sub(1);
        self.state.active.set(remaining);
        tracing::debug!(connection_id = %self.id, remaining, "Connection closed");

        if remaining == 0 && self.state.draining.get() {
            self.state.finish_shutdown();
        }
    }
}
