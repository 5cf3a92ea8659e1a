//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Parse options → Validate external args → Logging → Initialize subsystems → Launch → Run
//!
//! Event loop (reactor.rs):
//!     Signals, timers and sockets → callbacks on one thread, one at a time
//!
//! Signals (signals.rs):
//!     SIGINT → close listeners, drain connections
//!     SIGINT again / SIGTERM → close connections, exit
//!
//! Heartbeat (heartbeat.rs):
//!     Every hour → log uptime and connection counts
//!
//! Shutdown (shutdown.rs):
//!     Mode selection, immediate-close broadcast
//! ```
//!
//! # Design Decisions
//! - Ordered startup: crypto, reactor, DNS, signals, heartbeat, listeners
//! - Ordered teardown: the exact reverse, releasing only what was acquired
//! - Shutdown progress is monotonic; repeated signals only escalate

pub mod heartbeat;
pub mod reactor;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use reactor::{ExitHandle, ExitRequest, Reactor, Signal, Subscription};
pub use shutdown::{Shutdown, ShutdownMode, ShutdownTarget};
pub use signals::{ShutdownState, SignalCoordinator};
pub use startup::{run, usage, Stage};

/// Send `signal` (a `kill` flag such as `-INT`) to this process.
///
/// Handlers must already be registered, or the default action applies.
#[cfg(all(test, unix))]
pub(crate) fn raise(signal: &str) {
    let status = std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("kill {signal} {}", std::process::id()))
        .status()
        .expect("spawn sh");
    assert!(status.success(), "kill {signal} failed");
}
