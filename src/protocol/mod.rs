//! Pluggable transport registry.
//!
//! # Data Flow
//! ```text
//! external launcher / managed launcher
//!     → Registry::get(name)
//!     → Protocol::config(args) | Protocol::managed_config(role)
//!     → ListenerConfig (what the network layer binds)
//! ```
//!
//! # Design Decisions
//! - The catalog is a small ordered list, looked up by linear scan
//! - Names are unique and matched case-sensitively
//! - A protocol only describes listeners; moving bytes is the network's job

pub mod dummy;
pub mod obfs2;

use std::fmt;
use std::net::SocketAddr;

use clap::ValueEnum;
use thiserror::Error;

use crate::net::addr::AddrError;

/// Error type for protocol configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("{protocol}: {reason}")]
    InvalidArguments {
        protocol: &'static str,
        reason: String,
    },
    #[error("{protocol}: {source}")]
    Address {
        protocol: &'static str,
        #[source]
        source: AddrError,
    },
    #[error("{0}: no wire codec is available for this transport")]
    CodecUnavailable(&'static str),
}

/// Which side of the circuit a listener serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListenerRole {
    Client,
    Socks,
    Server,
}

impl ListenerRole {
    /// Port used when the listen address has none.
    pub fn default_port(self) -> u16 {
        match self {
            ListenerRole::Client => 48988,
            ListenerRole::Socks => 23548,
            ListenerRole::Server => 11253,
        }
    }
}

/// What a listener does with an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenMode {
    /// Always connect to the same remote peer.
    SimpleClient { target: SocketAddr },
    /// Learn the remote peer from a SOCKS5 request.
    SocksClient,
    /// Forward to the local service (the ORPort for a bridge).
    SimpleServer { target: SocketAddr },
}

/// One listening socket and the transport behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub protocol: &'static str,
    pub mode: ListenMode,
    pub listen: SocketAddr,
}

/// Listener parameters handed over by the controlling parent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagedRole {
    Client,
    Server { bind: SocketAddr, or_port: SocketAddr },
}

/// A pluggable transport.
pub trait Protocol: Sync {
    fn name(&self) -> &'static str;

    /// Build a listener from the arguments that followed the protocol name
    /// on the command line.
    fn config(&self, args: &[String]) -> Result<ListenerConfig, ProtocolError>;

    /// Build a listener for a managed proxy.
    fn managed_config(&self, role: ManagedRole) -> Result<ListenerConfig, ProtocolError>;
}

/// A registered transport.
#[derive(Clone, Copy)]
pub struct ProtocolDescriptor {
    name: &'static str,
    handle: &'static dyn Protocol,
}

impl ProtocolDescriptor {
    pub fn new(handle: &'static dyn Protocol) -> Self {
        Self {
            name: handle.name(),
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn protocol(&self) -> &'static dyn Protocol {
        self.handle
    }
}

impl fmt::Debug for ProtocolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolDescriptor").field("name", &self.name).finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("protocol '{0}' registered twice")]
    Duplicate(&'static str),
}

/// Ordered catalog of transports.
#[derive(Debug, Clone)]
pub struct Registry {
    protocols: Vec<ProtocolDescriptor>,
}

impl Registry {
    /// Build a registry, rejecting duplicate names.
    pub fn new<I>(handles: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = &'static dyn Protocol>,
    {
        let mut protocols: Vec<ProtocolDescriptor> = Vec::new();
        for handle in handles {
            let descriptor = ProtocolDescriptor::new(handle);
            if protocols.iter().any(|p| p.name == descriptor.name) {
                return Err(RegistryError::Duplicate(descriptor.name));
            }
            protocols.push(descriptor);
        }
        Ok(Self { protocols })
    }

    /// The transports compiled into this proxy.
    pub fn builtin() -> Self {
        Self {
            protocols: vec![
                ProtocolDescriptor::new(&dummy::Dummy),
                ProtocolDescriptor::new(&obfs2::Obfs2),
            ],
        }
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&'static dyn Protocol> {
        self.protocols
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.handle)
    }

    pub fn list(&self) -> &[ProtocolDescriptor] {
        &self.protocols
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// First line of a clap error, without the `error: ` prefix.
pub(crate) fn clap_reason(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.trim_start_matches("error: ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_in_order() {
        let registry = Registry::builtin();
        let names: Vec<_> = registry.list().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["dummy", "obfs2"]);
    }

    #[test]
    fn lookup_is_exact() {
        let registry = Registry::builtin();
        assert!(registry.is_supported("obfs2"));
        assert!(registry.is_supported("dummy"));
        assert!(!registry.is_supported("OBFS2"));
        assert!(!registry.is_supported("obfs"));
        assert!(!registry.is_supported(""));
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = Registry::new([&dummy::Dummy as &dyn Protocol, &obfs2::Obfs2, &dummy::Dummy])
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("dummy"));
    }

    #[test]
    fn builtin_matches_validated_construction() {
        let checked = Registry::new([&dummy::Dummy as &dyn Protocol, &obfs2::Obfs2]).unwrap();
        let builtin = Registry::builtin();
        assert_eq!(checked.list().len(), builtin.list().len());
    }
}
