//! The network collaborator: open listeners, live connections, and the
//! shutdown entry points the signal coordinator drives.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::AbortHandle;

use crate::dns::Resolver;
use crate::lifecycle::reactor::Reactor;
use crate::lifecycle::shutdown::{Shutdown, ShutdownMode, ShutdownTarget};
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerError};
use crate::net::relay;
use crate::observability::{safe_addr, Status};
use crate::protocol::{ListenMode, ListenerConfig};

/// Pause after a failed accept (e.g. out of descriptors) before retrying.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Cheap to clone; every clone shares the same listeners and connections.
#[derive(Clone)]
pub struct Network {
    inner: Rc<Inner>,
}

struct Inner {
    listeners: RefCell<Vec<OpenListener>>,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
    resolver: Resolver,
    status: Rc<RefCell<Status>>,
    scrub: bool,
}

struct OpenListener {
    protocol: &'static str,
    local_addr: SocketAddr,
    task: AbortHandle,
}

impl Network {
    pub fn new(reactor: &Reactor, resolver: Resolver, status: Rc<RefCell<Status>>, scrub: bool) -> Self {
        Self {
            inner: Rc::new(Inner {
                listeners: RefCell::new(Vec::new()),
                tracker: ConnectionTracker::new(reactor.exit_handle()),
                shutdown: Shutdown::new(),
                resolver,
                status,
                scrub,
            }),
        }
    }

    /// Bind `config.listen` and start accepting on the reactor.
    ///
    /// Returns the bound address, which differs from the requested one when
    /// port 0 was asked for.
    pub fn open_listener(&self, reactor: &Reactor, config: &ListenerConfig) -> Result<SocketAddr, ListenerError> {
        let listener = {
            let _guard = reactor.enter();
            Listener::bind(config)?
        };
        let local_addr = listener.local_addr();

        let task = reactor.spawn_local(accept_loop(listener, self.clone()));
        self.inner.listeners.borrow_mut().push(OpenListener {
            protocol: config.protocol,
            local_addr,
            task: task.abort_handle(),
        });

        tracing::info!(
            protocol = config.protocol,
            address = %safe_addr(local_addr, self.inner.scrub),
            "Listening"
        );
        Ok(local_addr)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    pub fn connection_count(&self) -> u64 {
        self.inner.tracker.active_count()
    }

    /// Ask the loop to exit once nothing is left to drain.
    pub fn finish_shutdown(&self) {
        self.inner.tracker.finish_shutdown();
    }

    /// Release listeners and cut every connection still open.
    pub fn free(self) {
        self.close_all_listeners();
        self.inner.shutdown.trigger();
        tracing::debug!("Network freed");
    }

    fn accepted(&self, stream: TcpStream, peer: SocketAddr, mode: ListenMode) {
        let guard = self.inner.tracker.track();
        let total = {
            let mut status = self.inner.status.borrow_mut();
            status.note_connection(peer);
            status.connections()
        };
        let scrub = self.inner.scrub;
        tracing::debug!(
            connection_id = %guard.id(),
            peer = %safe_addr(peer, scrub),
            total,
            "New connection"
        );

        let resolver = self.inner.resolver.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::task::spawn_local(async move {
            let id = guard.id();
            tokio::select! {
                result = relay::serve(stream, mode, &resolver, scrub) => match result {
                    Ok((up, down)) => tracing::debug!(connection_id = %id, up, down, "Connection finished"),
                    Err(e) => tracing::info!(connection_id = %id, error = %e, "Connection failed"),
                },
                _ = shutdown.recv() => {
                    tracing::debug!(connection_id = %id, "Connection dropped by shutdown");
                }
            }
            drop(guard);
        });
    }
}

impl ShutdownTarget for Network {
    fn close_all_listeners(&self) {
        let listeners = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        if listeners.is_empty() {
            return;
        }
        for listener in &listeners {
            listener.task.abort();
            tracing::debug!(
                protocol = listener.protocol,
                address = %safe_addr(listener.local_addr, self.inner.scrub),
                "Listener closed"
            );
        }
        tracing::info!(count = listeners.len(), "Closed all listeners");
    }

    fn start_shutdown(&self, mode: ShutdownMode) {
        let open = self.inner.tracker.active_count();
        match mode {
            ShutdownMode::Graceful => {
                tracing::info!(connections = open, "Waiting for open connections to finish");
            }
            ShutdownMode::Immediate => {
                tracing::info!(connections = open, "Closing all connections");
                self.inner.shutdown.trigger();
            }
        }
        self.inner.tracker.begin_draining();
    }
}

async fn accept_loop(listener: Listener, network: Network) {
    let mode = listener.config().mode;
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => network.accepted(stream, peer, mode),
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}
