//! Host name resolution for SOCKS requests.
//!
//! Lookups run on the reactor through `tokio::net::lookup_host`, so a slow
//! DNS answer never stalls the event loop.

use std::io;
use std::net::SocketAddr;

/// Resolver used by the relay tasks of one reactor.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    _private: (),
}

impl Resolver {
    pub fn new() -> Self {
        tracing::debug!("DNS resolver initialized");
        Self::default()
    }

    /// Resolve `host:port` to the first usable address.
    pub async fn resolve(&self, host: &str, port: u16) -> io::Result<SocketAddr> {
        tokio::net::lookup_host((host, port))
            .await?
            .find(|addr| !addr.ip().is_unspecified())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("could not resolve {host}")))
    }

    pub fn free(self) {
        tracing::debug!("DNS resolver freed");
    }
}
