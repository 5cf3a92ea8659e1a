//! Signal-driven shutdown state machine.
//!
//! ```text
//! Running    --SIGINT-->  Draining     close listeners, graceful shutdown
//! Draining   --SIGINT-->  Terminating  immediate shutdown, exit loop
//! Running    --SIGTERM--> Terminating  close listeners, immediate, exit loop
//! Draining   --SIGTERM--> Terminating  immediate shutdown, exit loop
//! Terminating --any-->    Terminating  nothing
//! ```
//!
//! The coordinator runs inside reactor callbacks, which never overlap, so
//! its state needs no locking. It never touches individual connections;
//! draining is the network layer's job.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use super::reactor::{ExitRequest, Reactor, Signal, Subscription};
use super::shutdown::{ShutdownMode, ShutdownTarget};
use crate::observability::NOTICE;

/// Shutdown progress. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownState {
    Running,
    Draining,
    Terminating,
}

#[derive(Debug)]
pub struct SignalCoordinator {
    state: ShutdownState,
}

impl SignalCoordinator {
    pub fn new() -> Self {
        Self {
            state: ShutdownState::Running,
        }
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// Apply `signal` and return the new state.
    pub fn handle(&mut self, signal: Signal, network: &dyn ShutdownTarget, exit: &dyn ExitRequest) -> ShutdownState {
        self.state = match (self.state, signal) {
            (ShutdownState::Terminating, _) => {
                tracing::debug!(%signal, "Already terminating; ignoring signal");
                ShutdownState::Terminating
            }
            (ShutdownState::Running, Signal::Interrupt) => {
                tracing::info!(target: NOTICE, "Got SIGINT. Preparing shutdown");
                network.close_all_listeners();
                network.start_shutdown(ShutdownMode::Graceful);
                ShutdownState::Draining
            }
            (ShutdownState::Draining, Signal::Interrupt) => {
                tracing::info!(target: NOTICE, "Got SIGINT for the second time. Terminating");
                network.start_shutdown(ShutdownMode::Immediate);
                exit.request_exit();
                ShutdownState::Terminating
            }
            (state, Signal::Terminate) => {
                tracing::info!(target: NOTICE, "Got SIGTERM. Terminating");
                if state == ShutdownState::Running {
                    network.close_all_listeners();
                }
                network.start_shutdown(ShutdownMode::Immediate);
                exit.request_exit();
                ShutdownState::Terminating
            }
        };
        self.state
    }
}

impl Default for SignalCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Register interrupt and terminate handlers that feed `coordinator`.
pub fn register<N>(
    reactor: &Reactor,
    coordinator: Rc<RefCell<SignalCoordinator>>,
    network: N,
) -> io::Result<Vec<Subscription>>
where
    N: ShutdownTarget + Clone + 'static,
{
    let mut subscriptions = Vec::with_capacity(2);
    for signal in [Signal::Interrupt, Signal::Terminate] {
        let coordinator = Rc::clone(&coordinator);
        let network = network.clone();
        let exit = reactor.exit_handle();
        let subscription = reactor.register_signal(signal, move |signal| {
            coordinator.borrow_mut().handle(signal, &network, &exit);
        });
        match subscription {
            Ok(subscription) => subscriptions.push(subscription),
            Err(e) => {
                for registered in &subscriptions {
                    registered.cancel();
                }
                return Err(e);
            }
        }
    }
    Ok(subscriptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeNetwork {
        listener_closes: Cell<u32>,
        listeners_open: Cell<bool>,
        graceful: Cell<u32>,
        immediate: Cell<u32>,
    }

    impl FakeNetwork {
        fn new() -> Self {
            let network = Self::default();
            network.listeners_open.set(true);
            network
        }
    }

    impl ShutdownTarget for FakeNetwork {
        fn close_all_listeners(&self) {
            if self.listeners_open.replace(false) {
                self.listener_closes.set(self.listener_closes.get() + 1);
            }
        }

        fn start_shutdown(&self, mode: ShutdownMode) {
            let counter = match mode {
                ShutdownMode::Graceful => &self.graceful,
                ShutdownMode::Immediate => &self.immediate,
            };
            counter.set(counter.get() + 1);
        }
    }

    impl ShutdownTarget for Rc<FakeNetwork> {
        fn close_all_listeners(&self) {
            (**self).close_all_listeners();
        }

        fn start_shutdown(&self, mode: ShutdownMode) {
            (**self).start_shutdown(mode);
        }
    }

    #[derive(Default)]
    struct FakeExit {
        calls: Cell<u32>,
    }

    impl ExitRequest for FakeExit {
        fn request_exit(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    #[test]
    fn first_interrupt_drains() {
        let (network, exit) = (FakeNetwork::new(), FakeExit::default());
        let mut coordinator = SignalCoordinator::new();

        assert_eq!(coordinator.handle(Signal::Interrupt, &network, &exit), ShutdownState::Draining);
        assert_eq!(network.listener_closes.get(), 1);
        assert_eq!(network.graceful.get(), 1);
        assert_eq!(network.immediate.get(), 0);
        assert_eq!(exit.calls.get(), 0);
    }

    #[test]
    fn second_interrupt_terminates() {
        let (network, exit) = (FakeNetwork::new(), FakeExit::default());
        let mut coordinator = SignalCoordinator::new();

        coordinator.handle(Signal::Interrupt, &network, &exit);
        assert_eq!(exit.calls.get(), 0);
        assert_eq!(coordinator.handle(Signal::Interrupt, &network, &exit), ShutdownState::Terminating);
        assert_eq!(exit.calls.get(), 1);
        assert_eq!(network.immediate.get(), 1);
        assert_eq!(network.listener_closes.get(), 1);
    }

    #[test]
    fn terminate_from_running() {
        let (network, exit) = (FakeNetwork::new(), FakeExit::default());
        let mut coordinator = SignalCoordinator::new();

        assert_eq!(coordinator.handle(Signal::Terminate, &network, &exit), ShutdownState::Terminating);
        assert_eq!(network.listener_closes.get(), 1);
        assert_eq!(network.graceful.get(), 0);
        assert_eq!(network.immediate.get(), 1);
        assert_eq!(exit.calls.get(), 1);
    }

    #[test]
    fn interrupt_then_terminate_closes_listeners_once() {
        let (network, exit) = (FakeNetwork::new(), FakeExit::default());
        let mut coordinator = SignalCoordinator::new();

        assert_eq!(coordinator.handle(Signal::Interrupt, &network, &exit), ShutdownState::Draining);
        assert_eq!(coordinator.handle(Signal::Terminate, &network, &exit), ShutdownState::Terminating);
        assert_eq!(network.listener_closes.get(), 1);
        assert_eq!(exit.calls.get(), 1);
    }

    #[test]
    fn terminating_ignores_everything() {
        let (network, exit) = (FakeNetwork::new(), FakeExit::default());
        let mut coordinator = SignalCoordinator::new();

        coordinator.handle(Signal::Terminate, &network, &exit);
        for signal in [Signal::Interrupt, Signal::Terminate, Signal::Interrupt] {
            assert_eq!(coordinator.handle(signal, &network, &exit), ShutdownState::Terminating);
        }
        assert_eq!(exit.calls.get(), 1);
        assert_eq!(network.immediate.get(), 1);
        assert_eq!(network.listener_closes.get(), 1);
    }

    #[test]
    fn state_never_moves_backwards() {
        let (network, exit) = (FakeNetwork::new(), FakeExit::default());
        let mut coordinator = SignalCoordinator::new();
        let mut last = coordinator.state();
        for signal in [Signal::Interrupt, Signal::Interrupt, Signal::Terminate] {
            let next = coordinator.handle(signal, &network, &exit);
            assert!(next >= last);
            last = next;
        }
    }

    // Other tests in this process may deliver SIGTERM concurrently, which
    // also ends in Terminating with listeners closed once.
    #[cfg(unix)]
    #[test]
    fn delivered_interrupts_drain_then_terminate() {
        let reactor = Reactor::new().unwrap();
        let network = Rc::new(FakeNetwork::new());
        let coordinator = Rc::new(RefCell::new(SignalCoordinator::new()));
        let subscriptions = register(&reactor, Rc::clone(&coordinator), Rc::clone(&network)).unwrap();
        assert_eq!(subscriptions.len(), 2);

        let exit = reactor.exit_handle();
        let _deadline = reactor
            .register_timer(Duration::from_secs(10), false, move || exit.request_exit())
            .unwrap();

        let sender = std::thread::spawn(|| {
            crate::lifecycle::raise("-INT");
            std::thread::sleep(Duration::from_millis(200));
            crate::lifecycle::raise("-INT");
        });
        reactor.run();
        sender.join().unwrap();

        assert_eq!(coordinator.borrow().state(), ShutdownState::Terminating);
        assert_eq!(network.listener_closes.get(), 1);
        assert_eq!(network.immediate.get(), 1);
        reactor.free();
    }
}
