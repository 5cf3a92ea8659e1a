//! Minimal SOCKS5 server side: no authentication, CONNECT only.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const VER_SOCKS5: u8 = 0x05;

pub const METHOD_NONE: u8 = 0x00;
pub const METHOD_INVALID: u8 = 0xff;

pub const CMD_CONNECT: u8 = 0x01;

pub const ADDR_TYPE_IPV4: u8 = 0x01;
pub const ADDR_TYPE_DOMAIN_NAME: u8 = 0x03;
pub const ADDR_TYPE_IPV6: u8 = 0x04;

/// Reply codes from RFC 1928 section 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reply {
    Succeeded = 0x00,
    GeneralFailure = 0x01,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

impl Reply {
    /// Best reply for a failed outbound connection.
    pub fn for_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Reply::ConnectionRefused,
            io::ErrorKind::NotFound => Reply::HostUnreachable,
            _ => Reply::GeneralFailure,
        }
    }
}

/// Where the SOCKS client wants to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocksTarget {
    Addr(SocketAddr),
    Domain(String, u16),
}

impl std::fmt::Display for SocksTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocksTarget::Addr(addr) => addr.fmt(f),
            SocksTarget::Domain(host, port) => write!(f, "{host}:{port}"),
        }
    }
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Run method negotiation and read the CONNECT request.
///
/// Failures that the client can be told about get a reply before the
/// error is returned.
pub async fn accept_request<S>(stream: &mut S) -> io::Result<SocksTarget>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let version = stream.read_u8().await?;
    if version != VER_SOCKS5 {
        return Err(invalid(format!("unsupported SOCKS version: {version}")));
    }

    let method_count = stream.read_u8().await? as usize;
    let mut methods = vec![0u8; method_count];
    stream.read_exact(&mut methods).await?;
    if !methods.contains(&METHOD_NONE) {
        stream.write_all(&[VER_SOCKS5, METHOD_INVALID]).await?;
        return Err(invalid("client offers no supported authentication method"));
    }
    stream.write_all(&[VER_SOCKS5, METHOD_NONE]).await?;

    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    let [version, command, _reserved, address_type] = header;
    if version != VER_SOCKS5 {
        return Err(invalid(format!("unsupported SOCKS version in request: {version}")));
    }
    if command != CMD_CONNECT {
        send_reply(stream, Reply::CommandNotSupported, None).await?;
        return Err(invalid(format!("unsupported SOCKS command: {command}")));
    }

    let target = match address_type {
        ADDR_TYPE_IPV4 => {
            let mut octets = [0u8; 4];
            stream.read_exact(&mut octets).await?;
            let port = stream.read_u16().await?;
            SocksTarget::Addr(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
        }
        ADDR_TYPE_IPV6 => {
            let mut octets = [0u8; 16];
            stream.read_exact(&mut octets).await?;
            let port = stream.read_u16().await?;
            SocksTarget::Addr(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        ADDR_TYPE_DOMAIN_NAME => {
            let len = stream.read_u8().await? as usize;
            let mut name = vec![0u8; len];
            stream.read_exact(&mut name).await?;
            let port = stream.read_u16().await?;
            let host = String::from_utf8(name).map_err(|_| invalid("domain name is not UTF-8"))?;
            SocksTarget::Domain(host, port)
        }
        other => {
            send_reply(stream, Reply::AddressTypeNotSupported, None).await?;
            return Err(invalid(format!("unsupported SOCKS address type: {other}")));
        }
    };

    Ok(target)
}

/// Send a reply carrying `bound` (or `0.0.0.0:0`).
pub async fn send_reply<S>(stream: &mut S, reply: Reply, bound: Option<SocketAddr>) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let bound = bound.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
    let mut message = vec![VER_SOCKS5, reply as u8, 0x00];
    match bound.ip() {
        IpAddr::V4(ip) => {
            message.push(ADDR_TYPE_IPV4);
            message.extend_from_slice(&ip.octets());
        }
        IpAddr::V6(ip) => {
            message.push(ADDR_TYPE_IPV6);
            message.extend_from_slice(&ip.octets());
        }
    }
    message.extend_from_slice(&bound.port().to_be_bytes());
    stream.write_all(&message).await?;
    stream.flush().await
}
