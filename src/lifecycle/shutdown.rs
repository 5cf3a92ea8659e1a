//! Shutdown directives issued to the network layer.

use tokio::sync::broadcast;

/// How open connections are treated once shutdown starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Stop accepting; let open connections finish, then exit the loop.
    Graceful,
    /// Drop every open connection now.
    Immediate,
}

/// The part of the network layer the signal coordinator drives.
pub trait ShutdownTarget {
    /// Close every listening socket. Calling it again is a no-op.
    fn close_all_listeners(&self);

    fn start_shutdown(&self, mode: ShutdownMode);
}

/// Broadcast used to tear down open connections on immediate shutdown.
///
/// Every connection task subscribes when it starts and drops its sockets as
/// soon as the signal fires.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
