//! Managed mode: the Tor pluggable-transport handshake (version 1).
//!
//! The parent describes what it wants through `TOR_PT_*` environment
//! variables and reads our answers, one line each, on stdout:
//!
//! ```text
//! VERSION 1
//! CMETHOD dummy socks5 127.0.0.1:40512
//! CMETHODS DONE
//! ```

use std::fmt;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::error::LaunchError;
use crate::lifecycle::reactor::Reactor;
use crate::net::{parse_addr, Network};
use crate::protocol::{ManagedRole, Registry};

/// Configuration protocol versions we speak.
pub const SUPPORTED_VERSIONS: &[&str] = &["1"];

const STATE_LOCATION: &str = "TOR_PT_STATE_LOCATION";
const TRANSPORT_VER: &str = "TOR_PT_MANAGED_TRANSPORT_VER";
const CLIENT_TRANSPORTS: &str = "TOR_PT_CLIENT_TRANSPORTS";
const EXTENDED_SERVER_PORT: &str = "TOR_PT_EXTENDED_SERVER_PORT";
const ORPORT: &str = "TOR_PT_ORPORT";
const SERVER_BINDADDR: &str = "TOR_PT_SERVER_BINDADDR";
const SERVER_TRANSPORTS: &str = "TOR_PT_SERVER_TRANSPORTS";

const SETUP_FAILED: &str = "could not setup protocol";
const LISTEN_FAILED: &str = "could not launch listener";

/// The environment variable that was missing or malformed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("failed on {0}")]
pub struct EnvError(pub &'static str);

/// Which side of the connection the parent wants us on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Side {
    Client,
    Server {
        /// Extended ORPort; accepted but unused.
        extended_port: Option<String>,
        or_port: String,
        /// One bind address per transport, in transport order.
        bind_addrs: Vec<SocketAddr>,
    },
}

/// Everything the parent told us through the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedEnv {
    pub state_location: PathBuf,
    pub versions: Vec<String>,
    pub transports: Vec<String>,
    pub side: Side,
}

impl ManagedEnv {
    pub fn from_process_env() -> Result<Self, EnvError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read and validate the variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| lookup(name).ok_or(EnvError(name));

        let state_location = PathBuf::from(require(STATE_LOCATION)?);
        let versions = split_list(&require(TRANSPORT_VER)?);

        if let Some(transports) = lookup(CLIENT_TRANSPORTS) {
            return Ok(Self {
                state_location,
                versions,
                transports: split_list(&transports),
                side: Side::Client,
            });
        }

        let extended_port = lookup(EXTENDED_SERVER_PORT);
        let or_port = require(ORPORT)?;
        let bind_addrs = require(SERVER_BINDADDR)?;
        let transports = split_list(&require(SERVER_TRANSPORTS)?);
        let bind_addrs = validate_bind_addrs(&bind_addrs, &transports)?;

        Ok(Self {
            state_location,
            versions,
            transports,
            side: Side::Server {
                extended_port,
                or_port,
                bind_addrs,
            },
        })
    }

    pub fn is_server(&self) -> bool {
        matches!(self.side, Side::Server { .. })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// `TOR_PT_SERVER_BINDADDR` is `<transport>-<addr:port>,...`, one entry per
/// server transport and in the same order.
fn validate_bind_addrs(value: &str, transports: &[String]) -> Result<Vec<SocketAddr>, EnvError> {
    let entries = split_list(value);
    if entries.len() != transports.len() {
        return Err(EnvError(SERVER_BINDADDR));
    }

    entries
        .iter()
        .zip(transports)
        .map(|(entry, transport)| {
            let mut parts = entry.split('-');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(addr), None) if name == transport => {
                    parse_addr(addr, None).map_err(|_| EnvError(SERVER_BINDADDR))
                }
                _ => Err(EnvError(SERVER_BINDADDR)),
            }
        })
        .collect()
}

/// First offered version that we support.
pub fn negotiate_version(offered: &[String]) -> Option<&str> {
    offered
        .iter()
        .map(String::as_str)
        .find(|version| SUPPORTED_VERSIONS.contains(version))
}

/// Writes protocol lines to the parent, flushing each one.
pub struct MethodWriter<W> {
    out: W,
    scrub: bool,
}

impl MethodWriter<io::Stdout> {
    pub fn stdout(scrub: bool) -> Self {
        Self::new(io::stdout(), scrub)
    }
}

impl<W: Write> MethodWriter<W> {
    pub fn new(out: W, scrub: bool) -> Self {
        Self { out, scrub }
    }

    pub fn line(&mut self, line: fmt::Arguments<'_>) -> io::Result<()> {
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        // Method lines carry bridge addresses.
        if !self.scrub {
            tracing::debug!("We sent: {line}");
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Read the environment, negotiate, and open one listener per transport.
///
/// Returns how many listeners opened; zero is an error.
pub fn launch<W: Write>(
    registry: &Registry,
    env: Result<ManagedEnv, EnvError>,
    reactor: &Reactor,
    network: &Network,
    out: &mut MethodWriter<W>,
) -> Result<usize, LaunchError> {
    let env = match env {
        Ok(env) => env,
        Err(e) => {
            out.line(format_args!("ENV-ERROR {e}"))?;
            return Err(e.into());
        }
    };
    tracing::debug!(
        state_location = %env.state_location.display(),
        versions = ?env.versions,
        transports = ?env.transports,
        server = env.is_server(),
        "Managed proxy environment"
    );

    match negotiate_version(&env.versions) {
        Some(version) => out.line(format_args!("VERSION {version}"))?,
        None => {
            out.line(format_args!("VERSION-ERROR no-version"))?;
            return Err(LaunchError::Negotiation {
                offered: env.versions.clone(),
            });
        }
    }

    let (method, method_error, done) = match env.side {
        Side::Client => ("CMETHOD", "CMETHOD-ERROR", "CMETHODS DONE"),
        Side::Server { .. } => ("SMETHOD", "SMETHOD-ERROR", "SMETHODS DONE"),
    };

    let mut configs = Vec::with_capacity(env.transports.len());
    for (index, transport) in env.transports.iter().enumerate() {
        match managed_role(&env.side, index).and_then(|role| {
            let protocol = registry.get(transport)?;
            protocol.managed_config(role).ok()
        }) {
            Some(config) => configs.push((transport, config)),
            None => {
                tracing::warn!(transport = %transport, "Could not set up managed transport");
                out.line(format_args!("{method_error} {transport} {SETUP_FAILED}"))?;
            }
        }
    }

    let mut opened = 0;
    for (transport, config) in configs {
        match network.open_listener(reactor, &config) {
            Ok(addr) => {
                opened += 1;
                if env.is_server() {
                    out.line(format_args!("{method} {transport} {addr}"))?;
                } else {
                    out.line(format_args!("{method} {transport} socks5 {addr}"))?;
                }
            }
            Err(e) => {
                tracing::warn!(transport = %transport, error = %e, "Could not launch managed listener");
                out.line(format_args!("{method_error} {transport} {LISTEN_FAILED}"))?;
            }
        }
    }
    out.line(format_args!("{done}"))?;

    if opened == 0 {
        return Err(LaunchError::NoListeners);
    }
    Ok(opened)
}

fn managed_role(side: &Side, index: usize) -> Option<ManagedRole> {
    match side {
        Side::Client => Some(ManagedRole::Client),
        Side::Server { or_port, bind_addrs, .. } => Some(ManagedRole::Server {
            bind: *bind_addrs.get(index)?,
            or_port: parse_addr(or_port, None).ok()?,
        }),
    }
}
