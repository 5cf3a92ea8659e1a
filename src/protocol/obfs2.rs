//! The obfs2 transport, command-line surface only.
//!
//! ```text
//! obfs2 [--dest=<addr>] [--shared-secret=<secret>] <client|socks|server> <listen>
//! ```
//!
//! Arguments are fully validated so that a bad obfs2 line is reported the
//! same way as for any other transport. The obfs2 codec itself is not
//! compiled in, so a valid line still fails with `CodecUnavailable`.

use clap::Parser;

use super::{clap_reason, ListenerConfig, ListenerRole, ManagedRole, Protocol, ProtocolError};
use crate::net::addr::parse_addr;

const NAME: &str = "obfs2";

#[derive(Parser, Debug)]
#[command(
    name = "obfs2",
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Obfs2Args {
    /// Where the circuit goes; required for client and server.
    #[arg(long)]
    dest: Option<String>,
    #[arg(long)]
    shared_secret: Option<String>,
    #[arg(value_enum)]
    role: ListenerRole,
    listen: String,
}

pub struct Obfs2;

impl Obfs2 {
    fn validate(args: &[String]) -> Result<(), ProtocolError> {
        let parsed = Obfs2Args::try_parse_from(args).map_err(|e| invalid(&clap_reason(&e)))?;

        if matches!(parsed.shared_secret.as_deref(), Some("")) {
            return Err(invalid("--shared-secret must not be empty"));
        }

        match (parsed.role, &parsed.dest) {
            (ListenerRole::Socks, Some(_)) => return Err(invalid("socks mode can't have --dest")),
            (ListenerRole::Client | ListenerRole::Server, None) => {
                return Err(invalid("client/server mode needs --dest"))
            }
            _ => {}
        }

        parse_addr(&parsed.listen, Some(parsed.role.default_port()))
            .map_err(|source| ProtocolError::Address { protocol: NAME, source })?;
        if let Some(dest) = &parsed.dest {
            parse_addr(dest, None).map_err(|source| ProtocolError::Address { protocol: NAME, source })?;
        }
        Ok(())
    }
}

impl Protocol for Obfs2 {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self, args: &[String]) -> Result<ListenerConfig, ProtocolError> {
        Self::validate(args)?;
        Err(ProtocolError::CodecUnavailable(NAME))
    }

    fn managed_config(&self, _role: ManagedRole) -> Result<ListenerConfig, ProtocolError> {
        Err(ProtocolError::CodecUnavailable(NAME))
    }
}

fn invalid(reason: &str) -> ProtocolError {
    ProtocolError::InvalidArguments {
        protocol: NAME,
        reason: reason.to_string(),
    }
}
