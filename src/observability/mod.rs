//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! LogPolicy (from the dispatcher)
//!     → logging.rs (install the tracing subscriber: stderr, file or nothing)
//!
//! Accepted connections
//!     → status.rs (connection and unique-address counters)
//!     → hourly heartbeat summary
//! ```
//!
//! # Design Decisions
//! - Structured `tracing` fields everywhere; addresses go through `safe_addr`
//! - Notice-class records are info records on the `notice` target
//! - A managed proxy never writes log records to stdout or stderr
//! - Status counters reset once a day so the heartbeat reports recent traffic

pub mod logging;
pub mod status;

pub use logging::{safe_addr, LogGuard, NOTICE};
pub use status::Status;
