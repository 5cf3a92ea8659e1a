//! Single-threaded event loop.
//!
//! # Responsibilities
//! - Own the tokio runtime and the `LocalSet` every callback runs on
//! - Deliver OS signals and timer expiries as ordinary callbacks
//! - Block in `run()` until someone asks the loop to exit
//!
//! # Design Decisions
//! - `current_thread` runtime: callbacks never run in parallel
//! - Signal handlers only wake the loop; the callback runs later as a local
//!   task, never inside the signal handler itself
//! - Callbacks are synchronous, so one always finishes before the next starts
//! - Exit is cooperative: `request_exit()` takes effect once the running
//!   callback returns

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, EnterGuard, Runtime};
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle, LocalSet};

/// Signals the orchestrator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM / console close.
    Terminate,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Interrupt => f.write_str("SIGINT"),
            Signal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Anything that can ask the loop to stop.
pub trait ExitRequest {
    fn request_exit(&self);
}

/// Cloneable, thread-safe handle that stops [`Reactor::run`].
#[derive(Debug, Clone, Default)]
pub struct ExitHandle {
    inner: Arc<ExitState>,
}

#[derive(Debug, Default)]
struct ExitState {
    requested: AtomicBool,
    notify: Notify,
}

impl ExitHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        while !self.is_requested() {
            self.inner.notify.notified().await;
        }
    }
}

impl ExitRequest for ExitHandle {
    /// Idempotent; only the first call wakes the loop.
    fn request_exit(&self) {
        if !self.inner.requested.swap(true, Ordering::SeqCst) {
            tracing::debug!("Loop exit requested");
            self.inner.notify.notify_one();
        }
    }
}

/// A signal or timer registration.
#[derive(Debug)]
pub struct Subscription {
    what: &'static str,
    task: AbortHandle,
}

impl Subscription {
    /// Detach the registration. Safe to call from its own callback: the
    /// callback finishes and is never invoked again.
    pub fn cancel(&self) {
        tracing::trace!(subscription = self.what, "Cancelling subscription");
        self.task.abort();
    }
}

/// The event loop.
///
/// Field order matters: local tasks are dropped before the runtime that
/// drives their sockets.
pub struct Reactor {
    local: LocalSet,
    exit: ExitHandle,
    runtime: Runtime,
}

impl Reactor {
    /// Build the loop, failing if the I/O driver cannot be created.
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self::with_runtime(runtime))
    }

    /// Wrap an already built `current_thread` runtime.
    pub fn with_runtime(runtime: Runtime) -> Self {
        Self {
            local: LocalSet::new(),
            exit: ExitHandle::new(),
            runtime,
        }
    }

    /// Enter the runtime context, for creating sockets outside `run()`.
    pub fn enter(&self) -> EnterGuard<'_> {
        self.runtime.enter()
    }

    pub fn exit_handle(&self) -> ExitHandle {
        self.exit.clone()
    }

    /// Queue a task on the loop's thread.
    pub fn spawn_local<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + 'static,
    {
        self.local.spawn_local(future)
    }

    /// Call `callback` every time `signal` is delivered.
    pub fn register_signal<F>(&self, signal: Signal, mut callback: F) -> io::Result<Subscription>
    where
        F: FnMut(Signal) + 'static,
    {
        let mut stream = {
            let _guard = self.runtime.enter();
            SignalStream::new(signal)?
        };

        let task = self.local.spawn_local(async move {
            while stream.recv().await.is_some() {
                callback(signal);
            }
        });

        Ok(Subscription {
            what: "signal",
            task: task.abort_handle(),
        })
    }

    /// Call `callback` after `interval`, and then every `interval` if
    /// `persistent`.
    pub fn register_timer<F>(&self, interval: Duration, persistent: bool, mut callback: F) -> io::Result<Subscription>
    where
        F: FnMut() + 'static,
    {
        if interval.is_zero() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "timer interval must be non-zero"));
        }

        let task = self.local.spawn_local(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                callback();
                if !persistent {
                    break;
                }
            }
        });

        Ok(Subscription {
            what: "timer",
            task: task.abort_handle(),
        })
    }

    /// Dispatch callbacks until exit is requested.
    pub fn run(&self) {
        self.local.block_on(&self.runtime, self.exit.wait());
    }

    /// Drop every remaining task, then the runtime.
    pub fn free(self) {
        let Reactor { local, runtime, .. } = self;
        {
            let _guard = runtime.enter();
            drop(local);
        }
        drop(runtime);
        tracing::debug!("Reactor freed");
    }
}

impl ExitRequest for Reactor {
    fn request_exit(&self) {
        self.exit.request_exit();
    }
}

#[cfg(unix)]
struct SignalStream(tokio::signal::unix::Signal);

#[cfg(unix)]
impl SignalStream {
    fn new(signal: Signal) -> io::Result<Self> {
        use tokio::signal::unix::{signal as listen, SignalKind};
        let kind = match signal {
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Terminate => SignalKind::terminate(),
        };
        listen(kind).map(Self)
    }

    async fn recv(&mut self) -> Option<()> {
        self.0.recv().await
    }
}

#[cfg(windows)]
enum SignalStream {
    CtrlC(tokio::signal::windows::CtrlC),
    Close(tokio::signal::windows::CtrlClose),
}

#[cfg(windows)]
impl SignalStream {
    fn new(signal: Signal) -> io::Result<Self> {
        use tokio::signal::windows;
        match signal {
            Signal::Interrupt => windows::ctrl_c().map(Self::CtrlC),
            Signal::Terminate => windows::ctrl_close().map(Self::Close),
        }
    }

    async fn recv(&mut self) -> Option<()> {
        match self {
            Self::CtrlC(s) => s.recv().await,
            Self::Close(s) => s.recv().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn paused_reactor() -> Reactor {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();
        Reactor::with_runtime(runtime)
    }

    #[test]
    fn exit_requested_before_run() {
        let reactor = paused_reactor();
        reactor.request_exit();
        reactor.request_exit();
        reactor.run();
        assert!(reactor.exit_handle().is_requested());
    }

    #[test]
    fn persistent_and_one_shot_timers() {
        let reactor = paused_reactor();
        let ticks = Rc::new(Cell::new(0u32));
        let once = Rc::new(Cell::new(0u32));

        let t = Rc::clone(&ticks);
        reactor
            .register_timer(Duration::from_secs(10), true, move || t.set(t.get() + 1))
            .unwrap();
        let o = Rc::clone(&once);
        reactor
            .register_timer(Duration::from_secs(5), false, move || o.set(o.get() + 1))
            .unwrap();
        let exit = reactor.exit_handle();
        reactor
            .register_timer(Duration::from_secs(35), false, move || exit.request_exit())
            .unwrap();

        reactor.run();
        assert_eq!(ticks.get(), 3);
        assert_eq!(once.get(), 1);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let reactor = paused_reactor();
        let err = reactor.register_timer(Duration::ZERO, true, || {}).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn cancel_from_own_callback() {
        let reactor = paused_reactor();
        let fired = Rc::new(Cell::new(0u32));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let f = Rc::clone(&fired);
        let s = Rc::clone(&slot);
        let sub = reactor
            .register_timer(Duration::from_secs(1), true, move || {
                f.set(f.get() + 1);
                if f.get() == 2 {
                    if let Some(sub) = s.borrow().as_ref() {
                        sub.cancel();
                    }
                }
            })
            .unwrap();
        *slot.borrow_mut() = Some(sub);

        let exit = reactor.exit_handle();
        reactor
            .register_timer(Duration::from_secs(10), false, move || exit.request_exit())
            .unwrap();

        reactor.run();
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn exit_does_not_interrupt_running_callback() {
        let reactor = paused_reactor();
        let after = Rc::new(Cell::new(false));
        let exit = reactor.exit_handle();
        let a = Rc::clone(&after);
        reactor
            .register_timer(Duration::from_secs(1), false, move || {
                exit.request_exit();
                a.set(true);
            })
            .unwrap();

        reactor.run();
        assert!(after.get());
    }

    #[test]
    fn exit_from_another_thread() {
        let reactor = Reactor::new().unwrap();
        let exit = reactor.exit_handle();
        let waker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            exit.request_exit();
        });
        reactor.run();
        waker.join().unwrap();
    }
}
