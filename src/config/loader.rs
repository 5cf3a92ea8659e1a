//! Orchestrator argument dispatch.
//!
//! Consumes the leading run of `--` options, resolves the logging policy and
//! the proxy mode, and hands back everything after the prefix untouched.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::schema::{LogPolicy, ProxyMode, Severity};
use crate::config::validation::{resolve_policy, RequestedLogging, SeverityRequest};

const OPTION_MARKER: &str = "--";
const LOG_FILE: &str = "--log-file=";
const LOG_MIN_SEVERITY: &str = "--log-min-severity=";
const NO_LOG: &str = "--no-log";
const NO_SAFE_LOGGING: &str = "--no-safe-logging";
const MANAGED: &str = "--managed";

/// Error type for orchestrator argument parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgsError {
    #[error("a log file was already set")]
    DuplicateLogFile,
    #[error("a minimum log severity was already set")]
    DuplicateSeverity,
    #[error("unrecognizable argument '{0}'")]
    Unrecognized(String),
    #[error("log severity '{0}' makes no sense")]
    InvalidSeverity(String),
    #[error("--log-file= needs a path")]
    EmptyLogPath,
    #[error("managed mode can only log to a file")]
    ManagedConsoleLogging,
}

impl ArgsError {
    /// Contradictory or repeated options, as opposed to unknown ones.
    pub fn is_conflict(&self) -> bool {
        !matches!(self, ArgsError::Unrecognized(_))
    }
}

/// Outcome of the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub policy: LogPolicy,
    pub mode: ProxyMode,
}

impl Dispatch {
    /// Arguments left for the external launcher. Empty in managed mode.
    pub fn remainder(&self) -> &[String] {
        match &self.mode {
            ProxyMode::External(rest) => rest,
            ProxyMode::Managed => &[],
        }
    }
}

/// Parse orchestrator options from `args` (program name excluded).
///
/// Scanning stops at the first argument that does not start with `--`;
/// that argument and everything after it form the remainder.
pub fn parse_args<I, S>(args: I) -> Result<Dispatch, ArgsError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut args = args.into_iter().map(Into::into).peekable();
    let mut requested = RequestedLogging::default();
    let mut managed = false;

    while let Some(arg) = args.next_if(|arg: &String| arg.starts_with(OPTION_MARKER)) {
        if let Some(path) = arg.strip_prefix(LOG_FILE) {
            if requested.log_file.is_some() {
                return Err(ArgsError::DuplicateLogFile);
            }
            if path.is_empty() {
                return Err(ArgsError::EmptyLogPath);
            }
            requested.log_file = Some(PathBuf::from(path));
        } else if let Some(level) = arg.strip_prefix(LOG_MIN_SEVERITY) {
            if requested.severity.is_some() {
                return Err(ArgsError::DuplicateSeverity);
            }
            let level: Severity = level
                .parse()
                .map_err(|_| ArgsError::InvalidSeverity(level.to_string()))?;
            requested.severity = Some(SeverityRequest::Level(level));
        } else if arg == NO_LOG {
            if requested.severity.is_some() {
                return Err(ArgsError::DuplicateSeverity);
            }
            requested.severity = Some(SeverityRequest::Disabled);
        } else if arg == NO_SAFE_LOGGING {
            requested.scrub_addresses = false;
        } else if arg == MANAGED {
            managed = true;
        } else {
            return Err(ArgsError::Unrecognized(arg));
        }
    }

    let policy = resolve_policy(requested, managed)?;
    let mode = if managed {
        ProxyMode::Managed
    } else {
        ProxyMode::External(args.collect())
    };

    Ok(Dispatch { policy, mode })
}

/// One-line descriptions of the orchestrator options, for usage output.
pub fn option_help() -> [(&'static str, &'static str); 5] {
    [
        ("--log-file=<file>", "set logfile"),
        (
            "--log-min-severity=warn|notice|info|debug",
            "set minimum logging severity (default: notice)",
        ),
        ("--no-log", "disable logging"),
        ("--no-safe-logging", "disable safe (scrubbed address) logging"),
        ("--managed", "run as a managed proxy configured by the parent process"),
    ]
}
