//! The identity transport: bytes cross the proxy unchanged.
//!
//! ```text
//! dummy client <listen> <target>
//! dummy server <listen> <target>
//! dummy socks <listen>
//! ```

use clap::Parser;

use super::{clap_reason, ListenMode, ListenerConfig, ListenerRole, ManagedRole, Protocol, ProtocolError};
use crate::net::addr::parse_addr;

const NAME: &str = "dummy";

#[derive(Parser, Debug)]
#[command(name = "dummy", no_binary_name = true, disable_help_flag = true)]
struct DummyArgs {
    #[arg(value_enum)]
    role: ListenerRole,
    listen: String,
    target: Option<String>,
}

pub struct Dummy;

impl Protocol for Dummy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self, args: &[String]) -> Result<ListenerConfig, ProtocolError> {
        let parsed = DummyArgs::try_parse_from(args).map_err(|e| ProtocolError::InvalidArguments {
            protocol: NAME,
            reason: clap_reason(&e),
        })?;

        let listen = parse_addr(&parsed.listen, Some(parsed.role.default_port()))
            .map_err(|source| ProtocolError::Address { protocol: NAME, source })?;

        let target = match (parsed.role, parsed.target) {
            (ListenerRole::Socks, None) => None,
            (ListenerRole::Socks, Some(_)) => {
                return Err(invalid("socks mode takes no target address"));
            }
            (_, None) => return Err(invalid("client and server modes need a target address")),
            (_, Some(target)) => Some(
                parse_addr(&target, None)
                    .map_err(|source| ProtocolError::Address { protocol: NAME, source })?,
            ),
        };

        let mode = match (parsed.role, target) {
            (ListenerRole::Client, Some(target)) => ListenMode::SimpleClient { target },
            (ListenerRole::Server, Some(target)) => ListenMode::SimpleServer { target },
            _ => ListenMode::SocksClient,
        };

        Ok(ListenerConfig {
            protocol: NAME,
            mode,
            listen,
        })
    }

    fn managed_config(&self, role: ManagedRole) -> Result<ListenerConfig, ProtocolError> {
        Ok(managed_listener(NAME, role))
    }
}

/// Listener layout every transport uses under a managed parent: clients get
/// a SOCKS listener on an ephemeral loopback port, servers forward to the
/// ORPort.
pub(crate) fn managed_listener(protocol: &'static str, role: ManagedRole) -> ListenerConfig {
    match role {
        ManagedRole::Client => ListenerConfig {
            protocol,
            mode: ListenMode::SocksClient,
            listen: std::net::SocketAddr::from(([127, 0, 0, 1], 0)),
        },
        ManagedRole::Server { bind, or_port } => ListenerConfig {
            protocol,
            mode: ListenMode::SimpleServer { target: or_port },
            listen: bind,
        },
    }
}

fn invalid(reason: &str) -> ProtocolError {
    ProtocolError::InvalidArguments {
        protocol: NAME,
        reason: reason.to_string(),
    }
}
