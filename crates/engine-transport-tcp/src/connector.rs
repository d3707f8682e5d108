//! TCP-backed [`Connector`]: resolves `target` through a
//! [`engine_core::DnsResolver`] when it isn't already a literal address, then races the
//! connect attempt against the caller's deadline and cancellation token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use engine_core::address::parse_uri;
use engine_core::contract::{Cancellation, Deadline};
use engine_core::dns::DnsResolver;
use engine_core::task::TaskScheduler;
use engine_core::transport::connector::{ConnectCallback, Connector};
use engine_core::transport::endpoint::Endpoint;
use engine_core::Status;
use tokio::net::TcpStream;

use crate::endpoint::TcpEndpoint;

pub struct TcpConnector {
    runtime: tokio::runtime::Handle,
    resolver: Arc<dyn DnsResolver>,
    scheduler: Arc<dyn TaskScheduler>,
    idle_timeout: Duration,
    clock: engine_core::clock::SystemClock,
}

impl TcpConnector {
    pub fn new(
        runtime: tokio::runtime::Handle,
        resolver: Arc<dyn DnsResolver>,
        scheduler: Arc<dyn TaskScheduler>,
        idle_timeout: Duration,
    ) -> Self {
        TcpConnector {
            runtime,
            resolver,
            scheduler,
            idle_timeout,
            clock: engine_core::clock::SystemClock::default(),
        }
    }
}

impl Connector for TcpConnector {
    fn connect(
        &self,
        target: &str,
        deadline: Deadline,
        cancellation: Cancellation,
        on_connect: ConnectCallback,
    ) {
        let target = target.to_string();
        let runtime = self.runtime.clone();
        let resolver = self.resolver.clone();
        let scheduler = self.scheduler.clone();
        let idle_timeout = self.idle_timeout;
        let settled = Arc::new(AtomicBool::new(false));
        let on_connect = Arc::new(std::sync::Mutex::new(Some(on_connect)));

        let fire = move |status: Status, endpoint: Option<Arc<dyn Endpoint>>| {
            if settled.swap(true, Ordering::AcqRel) {
                return;
            }
            if let Some(cb) = on_connect.lock().unwrap().take() {
                cb(status, endpoint);
            }
        };

        let watchdog_fire = fire.clone();
        crate::util::race_deadline_and_cancellation(
            &self.runtime,
            deadline,
            cancellation,
            &self.clock,
            move |status| watchdog_fire(status, None),
        );

        let connect_fire = fire.clone();
        self.runtime.spawn(async move {
            let socket_addr = match parse_uri(&target) {
                Some(addr) => match std::net::SocketAddr::try_from(addr) {
                    Ok(sa) => sa,
                    Err(_) => {
                        connect_fire(
                            Status::Unimplemented("unix-domain connect is not supported".into()),
                            None,
                        );
                        return;
                    }
                },
                None => match resolve_first(&*resolver, &target).await {
                    Ok(sa) => sa,
                    Err(status) => {
                        connect_fire(status, None);
                        return;
                    }
                },
            };

            match TcpStream::connect(socket_addr).await {
                Ok(stream) => {
                    match TcpEndpoint::new(stream, runtime.clone(), scheduler.clone(), idle_timeout) {
                        Ok(endpoint) => connect_fire(Status::Ok, Some(endpoint)),
                        Err(err) => connect_fire(crate::error::io_error_to_status(err), None),
                    }
                }
                Err(err) => connect_fire(crate::error::io_error_to_status(err), None),
            }
        });
    }
}

async fn resolve_first(
    resolver: &dyn DnsResolver,
    target: &str,
) -> Result<std::net::SocketAddr, Status> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| Status::Unreachable(format!("'{target}' is not host:port")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| Status::Unreachable(format!("invalid port in '{target}'")))?;

    let result = resolver
        .resolve_hostname(host)
        .await
        .map_err(|err| err.into_status())?;
    let addr = result
        .addresses
        .into_iter()
        .next()
        .ok_or_else(|| Status::NotFound(format!("no addresses found for '{host}'")))?;
    let mut socket_addr = std::net::SocketAddr::try_from(addr)
        .map_err(|_| Status::Internal("resolved address was not IP".into()))?;
    socket_addr.set_port(port);
    Ok(socket_addr)
}
