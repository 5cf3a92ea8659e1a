//! Hourly liveness messages.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use super::reactor::{Reactor, Subscription};
use crate::observability::Status;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Register the persistent heartbeat timer.
pub fn register(reactor: &Reactor, status: Rc<RefCell<Status>>) -> io::Result<Subscription> {
    reactor.register_timer(HEARTBEAT_INTERVAL, true, move || {
        status.borrow_mut().log_heartbeat();
    })
}
