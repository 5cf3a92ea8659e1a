//! TCP listener binding and accepting.
//!
//! # Responsibilities
//! - Bind the address a transport was configured with
//! - Report the bound address (ephemeral ports included)
//! - Accept incoming TCP connections

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::protocol::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind { addr: SocketAddr, source: std::io::Error },
    /// Failed to accept connection.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind { addr, source } => write!(f, "Failed to bind {}: {}", addr, source),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind { source, .. } => Some(source),
            ListenerError::Accept(e) => Some(e),
        }
    }
}

/// A bound listening socket and the transport configuration behind it.
pub struct Listener {
    inner: TcpListener,
    config: ListenerConfig,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind synchronously, so a failure is known before the loop starts.
    ///
    /// Must be called from within the reactor's runtime context.
    pub fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr = config.listen;
        let bind_err = |source| ListenerError::Bind { addr, source };

        let std_listener = std::net::TcpListener::bind(addr).map_err(bind_err)?;
        std_listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = std_listener.local_addr().map_err(bind_err)?;
        let inner = TcpListener::from_std(std_listener).map_err(bind_err)?;

        Ok(Self {
            inner,
            config: config.clone(),
            local_addr,
        })
    }

    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::trace!(protocol = self.config.protocol, "Connection accepted");
        Ok((stream, addr))
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }
}
