//! Top-level error type and the launch/init errors that only the
//! orchestrator produces.

use std::io;

use thiserror::Error;

use crate::config::ArgsError;
use crate::lifecycle::startup::Stage;
use crate::managed::EnvError;
use crate::net::listener::ListenerError;
use crate::observability::logging::LogError;
use crate::protocol::ProtocolError;

pub type Result<T> = std::result::Result<T, Error>;

/// A subsystem failed to come up.
#[derive(Debug, Error)]
#[error("failed to initialize {stage}: {source}")]
pub struct InitError {
    pub stage: Stage,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl InitError {
    pub fn new(stage: Stage, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Failure of the external or managed launcher.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("failed to open listeners for configuration {index}: {source}")]
    Bind {
        index: usize,
        #[source]
        source: ListenerError,
    },
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("no supported managed transport version offered: {offered:?}")]
    Negotiation { offered: Vec<String> },
    #[error("no listeners could be opened")]
    NoListeners,
    #[error("writing to the controlling process failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Args(#[from] ArgsError),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

impl Error {
    /// Whether the usage text should accompany the diagnostic.
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Args(_) | Error::Launch(LaunchError::Usage(_)))
    }

    pub fn exit_code(&self) -> u8 {
        1
    }
}
