//! Logging backend.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber described by a `LogPolicy`
//! - Own the log file so teardown can flush and close it
//! - Scrub addresses out of log lines unless asked not to

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogDestination, LogPolicy, Severity};

/// Target for notice-class records: startup, exit, signals and heartbeats.
pub const NOTICE: &str = "notice";

/// Error type for logging setup.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed creating log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("a global log subscriber is already installed")]
    AlreadyInstalled,
}

/// Keeps the log destination alive until teardown.
#[derive(Debug, Default)]
pub struct LogGuard {
    file: Option<Arc<File>>,
}

impl LogGuard {
    /// Flush and release the log file. Errors are ignored; there is nowhere
    /// left to report them.
    pub fn close(self) {
        if let Some(file) = self.file {
            let _ = file.sync_all();
        }
    }
}

/// The filter admitting records at `min_severity` and above.
pub fn filter(min_severity: Severity) -> EnvFilter {
    EnvFilter::new(min_severity.directive())
}

/// Install the subscriber for `policy`.
pub fn init(policy: &LogPolicy) -> Result<LogGuard, LogError> {
    let filter = filter(policy.min_severity);

    match &policy.destination {
        LogDestination::Null => Ok(LogGuard::default()),
        LogDestination::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .map_err(|_| LogError::AlreadyInstalled)?;
            Ok(LogGuard::default())
        }
        LogDestination::File(path) => {
            let file = Arc::new(open_log_file(path)?);
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::clone(&file)),
                )
                .try_init()
                .map_err(|_| LogError::AlreadyInstalled)?;
            Ok(LogGuard { file: Some(file) })
        }
    }
}

/// Open `path` for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> Result<File, LogError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// An address that prints as `[scrubbed]` when scrubbing is on.
#[derive(Debug, Clone, Copy)]
pub struct SafeAddr<T> {
    addr: T,
    scrub: bool,
}

pub fn safe_addr<T: fmt::Display>(addr: T, scrub: bool) -> SafeAddr<T> {
    SafeAddr { addr, scrub }
}

impl<T: fmt::Display> fmt::Display for SafeAddr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scrub {
            f.write_str("[scrubbed]")
        } else {
            self.addr.fmt(f)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tracing::Level;

    #[test]
    fn notice_hides_plain_info() {
        let subscriber = tracing_subscriber::registry().with(filter(Severity::Notice));
        tracing::subscriber::with_default(subscriber, || {
            assert!(!tracing::enabled!(Level::INFO));
            assert!(tracing::enabled!(target: NOTICE, Level::INFO));
            assert!(tracing::enabled!(Level::WARN));
        });
    }

    #[test]
    fn info_admits_notice_and_info() {
        let subscriber = tracing_subscriber::registry().with(filter(Severity::Info));
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::INFO));
            assert!(tracing::enabled!(target: NOTICE, Level::INFO));
            assert!(!tracing::enabled!(Level::DEBUG));
        });
    }

    #[test]
    fn warn_hides_notice() {
        let subscriber = tracing_subscriber::registry().with(filter(Severity::Warn));
        tracing::subscriber::with_default(subscriber, || {
            assert!(!tracing::enabled!(target: NOTICE, Level::INFO));
            assert!(tracing::enabled!(Level::WARN));
        });
    }

    #[test]
    fn scrubbed_address() {
        let addr: SocketAddr = "10.1.2.3:443".parse().unwrap();
        assert_eq!(safe_addr(addr, true).to_string(), "[scrubbed]");
        assert_eq!(safe_addr(addr, false).to_string(), "10.1.2.3:443");
    }

    #[test]
    fn log_file_is_created_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obfsproxy.log");
        std::fs::write(&path, "old\n").unwrap();

        {
            use std::io::Write;
            let mut file = open_log_file(&path).unwrap();
            file.write_all(b"new\n").unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old\nnew\n");
    }

    #[test]
    fn unopenable_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_log_file(&dir.path().join("missing").join("x.log")).unwrap_err();
        assert!(matches!(err, LogError::Open { .. }));
    }

    #[test]
    fn null_destination_installs_nothing() {
        let policy = LogPolicy {
            destination: LogDestination::Null,
            ..LogPolicy::default()
        };
        let guard = init(&policy).unwrap();
        guard.close();
    }
}
