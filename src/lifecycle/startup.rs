//! Startup orchestration and ordered teardown.
//!
//! # Responsibilities
//! - Parse orchestrator options and install logging
//! - Initialize subsystems in dependency order
//! - Hand over to the external or managed launcher, then run the loop
//! - Release exactly what was acquired, in reverse order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - External arguments are validated before anything is initialized
//! - Teardown is best-effort and never fails

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::config::{self, loader::option_help, ProxyMode};
use crate::crypto::Crypto;
use crate::dns::Resolver;
use crate::error::{Error, InitError};
use crate::external;
use crate::lifecycle::heartbeat;
use crate::lifecycle::reactor::{Reactor, Subscription};
use crate::lifecycle::signals::{self, SignalCoordinator};
use crate::managed::{self, ManagedEnv, MethodWriter};
use crate::net::Network;
use crate::observability::{logging, LogGuard, NOTICE, Status};
use crate::protocol::{ListenerConfig, Registry};

/// A subsystem, as named in init failures and teardown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Crypto,
    Reactor,
    Dns,
    Signals,
    Heartbeat,
    Listeners,
    Status,
    Log,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Crypto => "cryptography",
            Stage::Reactor => "networking",
            Stage::Dns => "DNS resolver",
            Stage::Signals => "signal handling",
            Stage::Heartbeat => "heartbeat logs",
            Stage::Listeners => "listeners",
            Stage::Status => "status",
            Stage::Log => "log destination",
        })
    }
}

/// What to do once the subsystems are up.
#[derive(Debug, Clone)]
pub enum LaunchPlan {
    /// Listeners already validated from the command line.
    External(Vec<ListenerConfig>),
    /// Read the `TOR_PT_*` environment and report on stdout.
    Managed,
}

/// Every subsystem the proxy has acquired so far.
pub struct Proxy {
    scrub: bool,
    crypto: Option<Crypto>,
    reactor: Option<Reactor>,
    resolver: Option<Resolver>,
    status: Option<Rc<RefCell<Status>>>,
    network: Option<Network>,
    signals: Vec<Subscription>,
    heartbeat: Option<Subscription>,
    log: Option<LogGuard>,
}

impl Proxy {
    pub fn new(scrub: bool, log: Option<LogGuard>) -> Self {
        Self {
            scrub,
            crypto: None,
            reactor: None,
            resolver: None,
            status: None,
            network: None,
            signals: Vec::new(),
            heartbeat: None,
            log,
        }
    }

    /// Initialize every subsystem, then launch.
    ///
    /// On error, whatever was acquired stays recorded for `teardown`.
    pub fn start(&mut self, registry: &Registry, plan: LaunchPlan) -> Result<usize, Error> {
        self.crypto = Some(Crypto::initialize().map_err(|e| InitError::new(Stage::Crypto, e))?);

        let reactor = &*self
            .reactor
            .insert(Reactor::new().map_err(|e| InitError::new(Stage::Reactor, e))?);
        let resolver = self.resolver.insert(Resolver::new()).clone();

        let status = Rc::clone(self.status.insert(Rc::new(RefCell::new(Status::new()))));
        let network = self
            .network
            .insert(Network::new(reactor, resolver, Rc::clone(&status), self.scrub))
            .clone();

        let coordinator = Rc::new(RefCell::new(SignalCoordinator::new()));
        self.signals = signals::register(reactor, coordinator, network.clone())
            .map_err(|e| InitError::new(Stage::Signals, e))?;
        self.heartbeat = Some(heartbeat::register(reactor, status).map_err(|e| InitError::new(Stage::Heartbeat, e))?);

        let opened = match plan {
            LaunchPlan::External(configs) => external::launch(&configs, reactor, &network)?,
            LaunchPlan::Managed => {
                let mut out = MethodWriter::stdout(self.scrub);
                managed::launch(registry, ManagedEnv::from_process_env(), reactor, &network, &mut out)?
            }
        };
        tracing::debug!(listeners = opened, "Launch complete");
        Ok(opened)
    }

    /// Dispatch events until shutdown completes.
    pub fn run(&self) {
        if let Some(reactor) = &self.reactor {
            reactor.run();
        }
    }

    /// Release everything acquired, returning the stages in the order
    /// they were torn down.
    pub fn teardown(mut self) -> Vec<Stage> {
        tracing::info!(target: NOTICE, "Exiting.");
        let mut released = Vec::new();

        if let Some(network) = self.network.take() {
            network.free();
            released.push(Stage::Listeners);
        }
        if let Some(resolver) = self.resolver.take() {
            resolver.free();
            released.push(Stage::Dns);
        }
        if !self.signals.is_empty() {
            for subscription in self.signals.drain(..) {
                subscription.cancel();
            }
            released.push(Stage::Signals);
        }
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.cancel();
            released.push(Stage::Heartbeat);
        }
        if let Some(reactor) = self.reactor.take() {
            reactor.free();
            released.push(Stage::Reactor);
        }
        if let Some(crypto) = self.crypto.take() {
            crypto.cleanup();
            released.push(Stage::Crypto);
        }
        if let Some(status) = self.status.take() {
            status.borrow_mut().connections_cleanup();
            released.push(Stage::Status);
        }
        if let Some(log) = self.log.take() {
            log.close();
            released.push(Stage::Log);
        }

        released
    }
}

/// Usage text listing every registered protocol and the orchestrator options.
pub fn usage(registry: &Registry) -> String {
    let mut text = String::from(
        "Usage: obfsproxy [obfsproxy_args] protocol_name [protocol_args] protocol_name ...\n\
         * Available protocols:\n",
    );
    for descriptor in registry.list() {
        text.push_str(&format!("[{}] ", descriptor.name()));
    }
    text.push_str("\n* obfsproxy_args:\n");
    for (option, effect) in option_help() {
        text.push_str(&format!("{option} ~ {effect}\n"));
    }
    text
}

/// Run the proxy with `args` (program name excluded) until it shuts down.
///
/// Writes to a peer that went away must fail with `EPIPE` rather than kill
/// the process. The `obfsproxy` binary gets this from the Rust `main`
/// preamble, which ignores `SIGPIPE` on unix. A host embedding this function
/// with a custom entry point has to ignore `SIGPIPE` itself before calling it.
pub fn run<I, S>(args: I) -> Result<(), Error>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let dispatch = config::parse_args(args)?;
    let registry = Registry::builtin();

    let plan = match &dispatch.mode {
        ProxyMode::External(rest) => LaunchPlan::External(external::prepare(&registry, rest)?),
        ProxyMode::Managed => LaunchPlan::Managed,
    };

    let log = logging::init(&dispatch.policy)?;
    tracing::info!(target: NOTICE, "Starting.");

    let mut proxy = Proxy::new(dispatch.policy.scrub_addresses, Some(log));
    let outcome = proxy.start(&registry, plan);
    if outcome.is_ok() {
        proxy.run();
    }
    proxy.teardown();
    outcome.map(|_| ())
}
