//! Per-connection relaying.
//!
//! Every built-in transport moves bytes unchanged, so a session is: find
//! the remote peer, connect, then copy in both directions until either
//! side closes.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::dns::Resolver;
use crate::net::socks::{self, Reply, SocksTarget};
use crate::observability::safe_addr;
use crate::protocol::ListenMode;

/// Bytes moved by a finished session, as (inbound to outbound, outbound to inbound).
pub type Transferred = (u64, u64);

/// Serve one accepted connection to completion.
pub async fn serve(
    mut inbound: TcpStream,
    mode: ListenMode,
    resolver: &Resolver,
    scrub: bool,
) -> io::Result<Transferred> {
    let mut outbound = match mode {
        ListenMode::SimpleClient { target } | ListenMode::SimpleServer { target } => {
            tracing::debug!(remote = %safe_addr(target, scrub), "Connecting to fixed peer");
            TcpStream::connect(target).await?
        }
        ListenMode::SocksClient => {
            let target = socks::accept_request(&mut inbound).await?;
            tracing::debug!(remote = %safe_addr(&target, scrub), "SOCKS request");

            match connect_socks_target(&target, resolver).await {
                Ok(stream) => {
                    socks::send_reply(&mut inbound, Reply::Succeeded, stream.local_addr().ok()).await?;
                    stream
                }
                Err(e) => {
                    // The client may already be gone; the connect error is what matters.
                    let _ = socks::send_reply(&mut inbound, Reply::for_error(&e), None).await;
                    return Err(e);
                }
            }
        }
    };

    let _ = inbound.set_nodelay(true);
    let _ = outbound.set_nodelay(true);
    tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await
}

async fn connect_socks_target(target: &SocksTarget, resolver: &Resolver) -> io::Result<TcpStream> {
    let addr: SocketAddr = match target {
        SocksTarget::Addr(addr) => *addr,
        SocksTarget::Domain(host, port) => resolver.resolve(host, *port).await?,
    };
    TcpStream::connect(addr).await
}
