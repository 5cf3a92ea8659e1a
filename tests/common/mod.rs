//! Shared utilities for integration tests.
//!
//! The reactor owns the test thread while it runs, so peers live on plain
//! std threads with blocking sockets.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use obfsproxy::dns::Resolver;
use obfsproxy::lifecycle::Reactor;
use obfsproxy::net::Network;
use obfsproxy::observability::Status;

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a backend that echoes everything back on every connection.
pub fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            thread::spawn(move || {
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

/// Connect with timeouts so a broken relay fails the test instead of hanging it.
pub fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
    stream.set_write_timeout(Some(IO_TIMEOUT)).unwrap();
    stream
}

/// Write `payload` and read the same number of bytes back.
pub fn round_trip(stream: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    stream.write_all(payload).unwrap();
    let mut echoed = vec![0u8; payload.len()];
    stream.read_exact(&mut echoed).unwrap();
    echoed
}

pub struct Harness {
    pub reactor: Reactor,
    pub network: Network,
    pub status: Rc<RefCell<Status>>,
}

/// A reactor plus network collaborator, without signals or heartbeat.
pub fn harness() -> Harness {
    let reactor = Reactor::new().unwrap();
    let status = Rc::new(RefCell::new(Status::new()));
    let network = Network::new(&reactor, Resolver::new(), Rc::clone(&status), true);
    Harness {
        reactor,
        network,
        status,
    }
}

pub fn args(line: &str) -> Vec<String> {
    line.split_whitespace().map(String::from).collect()
}
