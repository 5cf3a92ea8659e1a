//! Numeric address parsing for listener and target arguments.

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddrError {
    #[error("'{0}' is not a valid address")]
    Invalid(String),
    #[error("'{0}': port required")]
    MissingPort(String),
}

/// Parse `ip:port`, `[ipv6]:port`, or, when `default_port` is given, a bare
/// `ip` / `[ipv6]`. Host names are never resolved here.
pub fn parse_addr(input: &str, default_port: Option<u16>) -> Result<SocketAddr, AddrError> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let bare = input
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(input);
    let ip: IpAddr = bare.parse().map_err(|_| AddrError::Invalid(input.to_string()))?;

    match default_port {
        Some(port) => Ok(SocketAddr::new(ip, port)),
        None => Err(AddrError::MissingPort(input.to_string())),
    }
}
