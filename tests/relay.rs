//! End-to-end relaying through a running reactor, and shutdown while
//! connections are open.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use obfsproxy::external;
use obfsproxy::lifecycle::{ExitRequest, ShutdownState, Signal, SignalCoordinator};
use obfsproxy::protocol::Registry;

mod common;

#[test]
fn dummy_client_relays_to_target() {
    let backend = common::start_echo_backend();
    let h = common::harness();

    let configs = external::prepare(
        &Registry::builtin(),
        &common::args(&format!("dummy client 127.0.0.1:0 {backend}")),
    )
    .unwrap();
    let listen = h.network.open_listener(&h.reactor, &configs[0]).unwrap();

    let exit = h.reactor.exit_handle();
    let client = thread::spawn(move || {
        let mut stream = common::connect(listen);
        let echoed = common::round_trip(&mut stream, b"through the proxy");
        exit.request_exit();
        echoed
    });

    h.reactor.run();
    assert_eq!(client.join().unwrap(), b"through the proxy");
    assert_eq!(h.status.borrow().connections(), 1);
    assert_eq!(h.status.borrow().unique_addresses(), 1);

    h.network.free();
    h.reactor.free();
}

#[test]
fn socks_listener_relays_to_requested_address() {
    let backend = common::start_echo_backend();
    let h = common::harness();

    let configs = external::prepare(&Registry::builtin(), &common::args("dummy socks 127.0.0.1:0")).unwrap();
    let listen = h.network.open_listener(&h.reactor, &configs[0]).unwrap();

    let exit = h.reactor.exit_handle();
    let client = thread::spawn(move || {
        let mut stream = common::connect(listen);
        stream.write_all(&[5, 1, 0]).unwrap();
        let mut choice = [0u8; 2];
        stream.read_exact(&mut choice).unwrap();
        assert_eq!(choice, [5, 0]);

        let mut request = vec![5, 1, 0, 1, 127, 0, 0, 1];
        request.extend_from_slice(&backend.port().to_be_bytes());
        stream.write_all(&request).unwrap();
        let mut reply = [0u8; 10];
        stream.read_exact(&mut reply).unwrap();

        let echoed = common::round_trip(&mut stream, b"socks payload");
        exit.request_exit();
        (reply[1], echoed)
    });

    h.reactor.run();
    let (reply, echoed) = client.join().unwrap();
    assert_eq!(reply, 0);
    assert_eq!(echoed, b"socks payload");

    h.network.free();
    h.reactor.free();
}

#[test]
fn interrupt_drains_until_last_connection_closes() {
    let backend = common::start_echo_backend();
    let h = common::harness();

    let configs = external::prepare(
        &Registry::builtin(),
        &common::args(&format!("dummy server 127.0.0.1:0 {backend}")),
    )
    .unwrap();
    let listen = h.network.open_listener(&h.reactor, &configs[0]).unwrap();

    let (draining_tx, draining_rx) = mpsc::channel();
    let client = thread::spawn(move || {
        let mut stream = common::connect(listen);
        assert_eq!(common::round_trip(&mut stream, b"before"), b"before");

        draining_rx.recv().unwrap();
        // Open connections keep working while draining; new ones are refused.
        assert_eq!(common::round_trip(&mut stream, b"during"), b"during");
        let refused = std::net::TcpStream::connect_timeout(&listen, Duration::from_secs(1)).is_err();
        drop(stream);
        refused
    });

    let coordinator = Rc::new(RefCell::new(SignalCoordinator::new()));
    let network = h.network.clone();
    let exit = h.reactor.exit_handle();
    let driver = Rc::clone(&coordinator);
    h.reactor.spawn_local(async move {
        while network.connection_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let state = driver.borrow_mut().handle(Signal::Interrupt, &network, &exit);
        assert_eq!(state, ShutdownState::Draining);
        assert!(!exit.is_requested());
        // Let the aborted accept task drop its socket.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = draining_tx.send(());
    });

    h.reactor.run();
    assert!(client.join().unwrap(), "listener should be closed while draining");
    assert_eq!(coordinator.borrow().state(), ShutdownState::Draining);
    assert_eq!(h.network.connection_count(), 0);
    assert_eq!(h.network.listener_count(), 0);

    h.network.free();
    h.reactor.free();
}

#[test]
fn terminate_exits_with_connections_open() {
    let backend = common::start_echo_backend();
    let h = common::harness();

    let configs = external::prepare(
        &Registry::builtin(),
        &common::args(&format!("dummy server 127.0.0.1:0 {backend}")),
    )
    .unwrap();
    let listen = h.network.open_listener(&h.reactor, &configs[0]).unwrap();

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let client = thread::spawn(move || {
        let mut stream = common::connect(listen);
        common::round_trip(&mut stream, b"hold");
        // Keep the connection open until the loop has stopped.
        let _ = done_rx.recv();
    });

    let coordinator = Rc::new(RefCell::new(SignalCoordinator::new()));
    let network = h.network.clone();
    let exit = h.reactor.exit_handle();
    let driver = Rc::clone(&coordinator);
    h.reactor.spawn_local(async move {
        while network.connection_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        driver.borrow_mut().handle(Signal::Terminate, &network, &exit);
    });

    h.reactor.run();
    assert_eq!(coordinator.borrow().state(), ShutdownState::Terminating);
    assert_eq!(h.network.listener_count(), 0);

    h.network.free();
    h.reactor.free();
    drop(done_tx);
    client.join().unwrap();
}
