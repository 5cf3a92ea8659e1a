//! Orchestrator configuration types.
//!
//! Everything here is produced once by the dispatcher in `loader.rs` and
//! never mutated afterwards.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogDestination {
    /// Standard error. Only reachable in external mode.
    #[default]
    Stderr,
    /// Append to a file.
    File(PathBuf),
    /// Discard everything.
    Null,
}

/// Minimum severity of records that reach the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Severity {
    Debug,
    Info,
    #[default]
    Notice,
    Warn,
}

impl Severity {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    ///
    /// `tracing` has no notice level. Notice records are info records on the
    /// `notice` target, so the notice filter admits that target at info and
    /// everything else from warn up.
    pub fn directive(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Notice => "warn,notice=info",
            Severity::Warn => "warn",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warn => "warn",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "notice" => Ok(Severity::Notice),
            "warn" => Ok(Severity::Warn),
            _ => Err(()),
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPolicy {
    pub destination: LogDestination,
    pub min_severity: Severity,
    /// Replace peer and listener addresses with `[scrubbed]` in logs.
    pub scrub_addresses: bool,
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self {
            destination: LogDestination::Stderr,
            min_severity: Severity::Notice,
            scrub_addresses: true,
        }
    }
}

/// How the proxy learns what to listen on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyMode {
    /// Configured from the command line; holds `protocol_name args...`.
    External(Vec<String>),
    /// Configured by the controlling parent through the environment.
    Managed,
}
