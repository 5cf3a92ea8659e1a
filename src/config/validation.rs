//! Cross-option validation of the orchestrator arguments.
//!
//! # Responsibilities
//! - Turn the raw requests collected by the loader into a `LogPolicy`
//! - Enforce the managed-mode logging constraints
//!
//! # Design Decisions
//! - Pure function over the collected requests: no logging is installed here
//! - Runs after the whole option prefix has been consumed, so option order
//!   never matters

use std::path::PathBuf;

use super::loader::ArgsError;
use super::schema::{LogDestination, LogPolicy, Severity};

/// The severity-setting action requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityRequest {
    Level(Severity),
    /// `--no-log`
    Disabled,
}

/// Logging options as requested, before mode constraints are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedLogging {
    pub log_file: Option<PathBuf>,
    pub severity: Option<SeverityRequest>,
    pub scrub_addresses: bool,
}

impl Default for RequestedLogging {
    fn default() -> Self {
        Self {
            log_file: None,
            severity: None,
            scrub_addresses: true,
        }
    }
}

/// Resolve the requested logging options for the selected mode.
///
/// A managed proxy shares stdout with the parent's handshake parser, so it
/// may only log to a file. Without a file it logs nothing at all.
pub fn resolve_policy(requested: RequestedLogging, managed: bool) -> Result<LogPolicy, ArgsError> {
    if managed && requested.log_file.is_none() {
        if requested.severity.is_some() {
            return Err(ArgsError::ManagedConsoleLogging);
        }
        return Ok(LogPolicy {
            destination: LogDestination::Null,
            min_severity: Severity::default(),
            scrub_addresses: requested.scrub_addresses,
        });
    }

    let (destination, min_severity) = match (requested.severity, requested.log_file) {
        (Some(SeverityRequest::Disabled), _) => (LogDestination::Null, Severity::default()),
        (Some(SeverityRequest::Level(level)), Some(path)) => (LogDestination::File(path), level),
        (Some(SeverityRequest::Level(level)), None) => (LogDestination::Stderr, level),
        (None, Some(path)) => (LogDestination::File(path), Severity::default()),
        (None, None) => (LogDestination::Stderr, Severity::default()),
    };

    Ok(LogPolicy {
        destination,
        min_severity,
        scrub_addresses: requested.scrub_addresses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requested(file: Option<&str>, severity: Option<SeverityRequest>) -> RequestedLogging {
        RequestedLogging {
            log_file: file.map(PathBuf::from),
            severity,
            scrub_addresses: true,
        }
    }

    #[test]
    fn managed_without_file_is_silenced() {
        let policy = resolve_policy(requested(None, None), true).unwrap();
        assert_eq!(policy.destination, LogDestination::Null);
    }

    #[test]
    fn managed_with_severity_but_no_file_conflicts() {
        let err = resolve_policy(requested(None, Some(SeverityRequest::Level(Severity::Debug))), true)
            .unwrap_err();
        assert_eq!(err, ArgsError::ManagedConsoleLogging);

        let err = resolve_policy(requested(None, Some(SeverityRequest::Disabled)), true).unwrap_err();
        assert_eq!(err, ArgsError::ManagedConsoleLogging);
    }

    #[test]
    fn managed_with_file_keeps_severity() {
        let policy = resolve_policy(
            requested(Some("/tmp/x.log"), Some(SeverityRequest::Level(Severity::Info))),
            true,
        )
        .unwrap();
        assert_eq!(policy.destination, LogDestination::File("/tmp/x.log".into()));
        assert_eq!(policy.min_severity, Severity::Info);
    }

    #[test]
    fn no_log_wins_over_file_in_external_mode() {
        let policy = resolve_policy(requested(Some("/tmp/x.log"), Some(SeverityRequest::Disabled)), false)
            .unwrap();
        assert_eq!(policy.destination, LogDestination::Null);
    }

    #[test]
    fn external_defaults_to_stderr() {
        let policy = resolve_policy(RequestedLogging::default(), false).unwrap();
        assert_eq!(policy, LogPolicy::default());
    }
}
