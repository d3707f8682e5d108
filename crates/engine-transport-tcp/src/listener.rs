//! TCP-backed [`Listener`], wrapping `tokio::net::TcpListener`'s bind/accept pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use engine_core::error::Result as EngineResult;
use engine_core::task::TaskScheduler;
use engine_core::transport::listener::{AcceptCallback, Listener, ShutdownCallback};
use engine_core::{EngineError, ResolvedAddress, Status};
use tokio::net::TcpListener as TokioTcpListener;

use crate::endpoint::TcpEndpoint;

pub struct TcpListenerImpl {
    inner: TokioTcpListener,
    local: ResolvedAddress,
    runtime: tokio::runtime::Handle,
    scheduler: Arc<dyn TaskScheduler>,
    idle_timeout: Duration,
    stopped: Arc<AtomicBool>,
    on_shutdown: Arc<Mutex<Option<ShutdownCallback>>>,
}

impl TcpListenerImpl {
    pub async fn bind(
        addr: ResolvedAddress,
        runtime: tokio::runtime::Handle,
        scheduler: Arc<dyn TaskScheduler>,
        idle_timeout: Duration,
    ) -> EngineResult<Self> {
        let socket_addr = crate::util::to_socket_addr(addr)
            .ok_or_else(|| EngineError::Unimplemented("unix listeners are not supported".into()))?;
        let inner = TokioTcpListener::bind(socket_addr)
            .await
            .map_err(EngineError::from)?;
        let local = ResolvedAddress::from(inner.local_addr().map_err(EngineError::from)?);
        Ok(TcpListenerImpl {
            inner,
            local,
            runtime,
            scheduler,
            idle_timeout,
            stopped: Arc::new(AtomicBool::new(false)),
            on_shutdown: Arc::new(Mutex::new(None)),
        })
    }

    /// Fires `on_shutdown` exactly once, whichever of `stop()`/`Drop` reaches it first.
    fn fire_shutdown(&self, status: Status) {
        if let Some(cb) = self.on_shutdown.lock().unwrap().take() {
            cb(status);
        }
    }
}

impl Listener for TcpListenerImpl {
    fn start(&self, on_accept: AcceptCallback, on_shutdown: ShutdownCallback) -> EngineResult<()> {
        *self.on_shutdown.lock().unwrap() = Some(on_shutdown);

        let local_addr = self.local;
        let stopped = self.stopped.clone();
        let runtime = self.runtime.clone();
        let scheduler = self.scheduler.clone();
        let idle_timeout = self.idle_timeout;

        // `tokio::net::TcpListener` cannot be cloned directly; the accept loop needs to
        // own one so it can run in a detached task, so the underlying socket is
        // duplicated through `socket2` the same way the endpoint's `close` reaches
        // for `socket2` to perform a synchronous shutdown.
        let cloned = socket2::SockRef::from(&self.inner)
            .try_clone()
            .map_err(EngineError::from)?;
        let std_listener: std::net::TcpListener = cloned.into();
        std_listener.set_nonblocking(true).map_err(EngineError::from)?;
        let tokio_listener = TokioTcpListener::from_std(std_listener).map_err(EngineError::from)?;

        runtime.clone().spawn(async move {
            loop {
                if stopped.load(Ordering::Acquire) {
                    return;
                }
                match tokio_listener.accept().await {
                    Ok((stream, peer)) => {
                        let peer = ResolvedAddress::from(peer);
                        match TcpEndpoint::new(stream, runtime.clone(), scheduler.clone(), idle_timeout) {
                            Ok(endpoint) => on_accept(endpoint, peer),
                            Err(err) => {
                                tracing::warn!(%err, "failed to wrap accepted socket");
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, %local_addr, "accept failed");
                    }
                }
            }
        });
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.fire_shutdown(Status::Ok);
    }

    fn local_address(&self) -> ResolvedAddress {
        self.local
    }
}

impl Drop for TcpListenerImpl {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        self.fire_shutdown(Status::Ok);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn stop_fires_shutdown_exactly_once() {
        let listener = TcpListenerImpl::bind(
            ResolvedAddress::from("127.0.0.1:0".parse::<std::net::SocketAddr>().unwrap()),
            tokio::runtime::Handle::current(),
            Arc::new(crate::task::TokioTaskScheduler::new(tokio::runtime::Handle::current())),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        listener
            .start(
                Arc::new(|_endpoint, _peer| {}),
                Box::new(move |_status| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        listener.stop();
        listener.stop();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_without_explicit_stop_still_fires_shutdown() {
        let listener = TcpListenerImpl::bind(
            ResolvedAddress::from("127.0.0.1:0".parse::<std::net::SocketAddr>().unwrap()),
            tokio::runtime::Handle::current(),
            Arc::new(crate::task::TokioTaskScheduler::new(tokio::runtime::Handle::current())),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        listener
            .start(
                Arc::new(|_endpoint, _peer| {}),
                Box::new(move |_status| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        drop(listener);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
