//! A pluggable-transport proxy.
//!
//! Listens for connections, runs them through a transport, and relays them
//! to the next hop. Configured either from the command line (external mode)
//! or by a controlling parent process through the environment (managed
//! mode).

// Core subsystems
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod protocol;

// Launchers
pub mod external;
pub mod managed;

// Supporting services
pub mod crypto;
pub mod dns;
pub mod error;
pub mod observability;

pub use error::{Error, Result};
pub use lifecycle::{run, usage};
pub use protocol::Registry;
