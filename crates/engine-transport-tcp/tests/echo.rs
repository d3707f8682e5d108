//! A client connects, writes a payload, the server echoes it back, the client reads it
//! and the bytes match exactly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use engine_core::buffer::{Slice, SliceBuffer};
use engine_core::contract::{Cancellation, Deadline};
use engine_core::transport::connector::Connector;
use engine_core::transport::listener::Listener;
use engine_core::{ResolvedAddress, Status};
use engine_transport_tcp::{Engine, TcpListenerImpl};

#[tokio::test]
async fn echo_round_trip() {
    let runtime = tokio::runtime::Handle::current();
    let config = engine_core::EngineConfig::default();
    let engine = Engine::new(config, runtime.clone()).unwrap();

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

    let accept_callback: engine_core::transport::listener::AcceptCallback = Arc::new(move |endpoint, _peer| {
        let echo_endpoint = endpoint.clone();
        endpoint.read(Box::new(move |status, buf| {
            assert_eq!(status, Status::Ok);
            echo_endpoint.write(
                buf,
                Box::new(|status| assert_eq!(status, Status::Ok)),
            );
        }));
    });
    listener
        .start(accept_callback, Box::new(|_status| {}))
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

    let mut payload = SliceBuffer::new();
    payload.push_back(Slice::from(b"hello engine".to_vec()));

    let (write_tx, write_rx) = tokio::sync::oneshot::channel();
    client.write(payload, Box::new(move |status| {
        let _ = write_tx.send(status);
    }));
    assert_eq!(write_rx.await.unwrap(), Status::Ok);

    let result: Arc<Mutex<Option<(Status, SliceBuffer)>>> = Arc::new(Mutex::new(None));
    let received = AtomicBool::new(false);
    let result_clone = result.clone();
    client.read(Box::new(move |status, buf| {
        *result_clone.lock().unwrap() = Some((status, buf));
    }));

    for _ in 0..200 {
        if result.lock().unwrap().is_some() {
            received.store(true, Ordering::SeqCst);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(received.load(Ordering::SeqCst), "echo response never arrived");

    let (status, buf) = result.lock().unwrap().take().unwrap();
    assert_eq!(status, Status::Ok);
    assert_eq!(buf.to_contiguous(), b"hello engine");
}
