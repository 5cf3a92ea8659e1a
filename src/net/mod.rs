//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bound socket, accept)
//!     → network.rs (accept loop, status accounting, shutdown fan-out)
//!     → connection.rs (lifecycle tracking, drain completion)
//!     → socks.rs (SOCKS5 request, socks listeners only)
//!     → relay.rs (connect to the remote peer, copy both ways)
//! ```
//!
//! # Design Decisions
//! - Listeners bind synchronously so failures surface before the loop runs
//! - Everything runs on the reactor thread; connection state is `Rc`-shared
//! - Graceful shutdown completes when the last tracked connection drops

pub mod addr;
pub mod connection;
pub mod listener;
pub mod network;
pub mod relay;
pub mod socks;

pub use addr::{parse_addr, AddrError};
pub use network::Network;
