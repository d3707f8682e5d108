//! Closing an endpoint with a read outstanding must settle that read's callback with
//! `Cancelled` exactly once, rather than letting whatever raw I/O error the shutdown
//! happens to produce leak through.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use engine_core::contract::{Cancellation, Deadline};
use engine_core::transport::connector::Connector;
use engine_core::transport::endpoint::Endpoint;
use engine_core::transport::listener::Listener;
use engine_core::{ResolvedAddress, Status};
use engine_transport_tcp::{Engine, TcpListenerImpl};

#[tokio::test]
async fn close_with_pending_read_reports_cancelled() {
    let runtime = tokio::runtime::Handle::current();
    let engine = Engine::new(engine_core::EngineConfig::default(), runtime.clone()).unwrap();

    let bind_addr = ResolvedAddress::from("127.0.0.1:0".parse::<std::net::SocketAddr>().unwrap());
    let listener = TcpListenerImpl::bind(
        bind_addr,
        runtime.clone(),
        engine.scheduler(),
        engine_core::EngineConfig::default().idle_timeout,
    )
    .await
    .unwrap();
    let local_addr = listener.local_address();

    // Accept connections but never read/write; just hold the peer endpoint open so the
    // client's own read genuinely has nothing to observe but `close()`.
    let held: Arc<Mutex<Vec<Arc<dyn Endpoint>>>> = Arc::new(Mutex::new(Vec::new()));
    let held_in_callback = held.clone();
    listener
        .start(
            Arc::new(move |endpoint, _peer| {
                held_in_callback.lock().unwrap().push(endpoint);
            }),
            Box::new(|_status| {}),
        )
        .unwrap();

    let connector = engine.connector();
    let (connect_tx, connect_rx) = tokio::sync::oneshot::channel();
    connector.connect(
        &format!("ipv4:{local_addr}"),
        Deadline::never(),
        Cancellation::new(),
        Box::new(move |status, endpoint| {
            let _ = connect_tx.send((status, endpoint));
        }),
    );
    let (status, endpoint) = connect_rx.await.unwrap();
    assert_eq!(status, Status::Ok);
    let client = endpoint.unwrap();

    let (read_tx, read_rx) = tokio::sync::oneshot::channel();
    client.read(Box::new(move |status, _buf| {
        let _ = read_tx.send(status);
    }));

    // Let the spawned read task actually start awaiting on the socket before closing.
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.close();

    let status = read_rx.await.unwrap();
    assert!(status.is_cancelled(), "expected Cancelled, got {status:?}");
}
