//! Orchestrator configuration.
//!
//! # Data Flow
//! ```text
//! argv (program name stripped)
//!     → loader.rs (consume the `--` option prefix)
//!     → validation.rs (mode constraints on logging)
//!     → Dispatch { LogPolicy, ProxyMode } (immutable)
//! ```
//!
//! # Design Decisions
//! - Each option may appear at most once; repeats are conflicts
//! - Errors are returned, never acted on; only `main` exits the process
//! - Protocol arguments are not interpreted here

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{parse_args, ArgsError, Dispatch};
pub use schema::{LogDestination, LogPolicy, ProxyMode, Severity};
