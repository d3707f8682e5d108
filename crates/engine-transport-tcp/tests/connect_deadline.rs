//! A connect attempt against a port nothing is listening on, and separately one
//! against an address that never responds, to exercise the deadline and cancellation
//! paths of `Connector::connect`.

use std::time::Duration;

use engine_core::contract::{Cancellation, Deadline};
use engine_core::{Connector, Status};
use engine_transport_tcp::Engine;

#[tokio::test]
async fn connect_to_closed_port_reports_unreachable() {
    let runtime = tokio::runtime::Handle::current();
    let engine = Engine::new(engine_core::EngineConfig::default(), runtime).unwrap();
    let connector = engine.connector();

    // Bind and immediately drop a listener to obtain a port nothing is listening on.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let (tx, rx) = tokio::sync::oneshot::channel();
    connector.connect(
        &format!("ipv4:{addr}"),
        Deadline::never(),
        Cancellation::new(),
        Box::new(move |status, endpoint| {
            let _ = tx.send((status, endpoint.is_some()));
        }),
    );

    let (status, has_endpoint) = rx.await.unwrap();
    assert!(!has_endpoint);
    assert!(matches!(status, Status::Unreachable(_)), "expected Unreachable, got {status:?}");
}

#[tokio::test]
async fn cancelling_before_connect_completes_reports_cancelled() {
    let runtime = tokio::runtime::Handle::current();
    let engine = Engine::new(engine_core::EngineConfig::default(), runtime).unwrap();
    let connector = engine.connector();

    // A non-routable TEST-NET-1 address (RFC 5737) that will not complete a TCP
    // handshake, so the cancellation token wins the race against the OS-level connect.
    let cancellation = Cancellation::new();
    let (tx, rx) = tokio::sync::oneshot::channel();
    connector.connect(
        "ipv4:192.0.2.1:9",
        Deadline::never(),
        cancellation.clone(),
        Box::new(move |status, endpoint| {
            let _ = tx.send((status, endpoint.is_some()));
        }),
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancellation.cancel();

    let (status, has_endpoint) = rx.await.unwrap();
    assert!(!has_endpoint);
    assert!(status.is_cancelled(), "expected Cancelled, got {status:?}");
}
