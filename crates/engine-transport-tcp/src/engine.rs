//! The Engine façade: owns the root memory quota, the task scheduler, the
//! DNS resolver, and hands out listeners/connectors built against the same Tokio
//! runtime handle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use engine_core::config::EngineConfig;
use engine_core::error::Result;
use engine_core::quota::MemoryQuota;
use engine_core::transport::listener::Listener;
use engine_core::{DnsResolver, ResolvedAddress};

use crate::connector::TcpConnector;
use crate::dns::HickoryDnsResolver;
use crate::listener::TcpListenerImpl;
use crate::task::TokioTaskScheduler;

/// The concrete, Tokio-backed implementation of the engine façade.
///
/// Owns the long-lived shared state (quota root, scheduler, resolver) and is the
/// factory every [`engine_core::Listener`]/[`engine_core::Connector`] is built from, so
/// resource accounting stays centralized instead of each endpoint tracking its own.
pub struct Engine {
    runtime: tokio::runtime::Handle,
    root_quota: MemoryQuota,
    scheduler: Arc<TokioTaskScheduler>,
    resolver: Arc<dyn DnsResolver>,
    idle_timeout: Duration,
    live_endpoints: AtomicUsize,
    live_listeners: AtomicUsize,
}

impl Engine {
    pub fn new(config: EngineConfig, runtime: tokio::runtime::Handle) -> Result<Arc<Self>> {
        let resolver: Arc<dyn DnsResolver> = Arc::new(HickoryDnsResolver::from_system_conf()?);
        Ok(Arc::new(Engine {
            root_quota: MemoryQuota::root("engine-root", config.resource_quota_bytes),
            scheduler: Arc::new(TokioTaskScheduler::new(runtime.clone())),
            resolver,
            idle_timeout: config.idle_timeout,
            runtime,
            live_endpoints: AtomicUsize::new(0),
            live_listeners: AtomicUsize::new(0),
        }))
    }

    pub fn root_quota(&self) -> &MemoryQuota {
        &self.root_quota
    }

    pub fn scheduler(&self) -> Arc<TokioTaskScheduler> {
        self.scheduler.clone()
    }

    pub fn resolver(&self) -> Arc<dyn DnsResolver> {
        self.resolver.clone()
    }

    pub fn connector(&self) -> TcpConnector {
        TcpConnector::new(
            self.runtime.clone(),
            self.resolver.clone(),
            self.scheduler.clone(),
            self.idle_timeout,
        )
    }

    pub async fn bind(self: &Arc<Self>, addr: ResolvedAddress) -> Result<Arc<dyn Listener>> {
        let listener = TcpListenerImpl::bind(
            addr,
            self.runtime.clone(),
            self.scheduler.clone(),
            self.idle_timeout,
        )
        .await?;
        self.live_listeners.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(listener))
    }

    /// Best-effort sanity check for "destruction with outstanding work". Real accounting of live endpoints/listeners is left to callers
    /// through [`Engine::note_endpoint_opened`]/[`Engine::note_endpoint_closed`]; this
    /// only asserts in debug builds since production callers may legitimately still be
    /// tearing down connections when the engine itself is dropped.
    pub fn debug_assert_quiescent(&self) {
        debug_assert_eq!(
            self.live_endpoints.load(Ordering::Relaxed),
            0,
            "engine dropped with live endpoints outstanding"
        );
        debug_assert_eq!(
            self.live_listeners.load(Ordering::Relaxed),
            0,
            "engine dropped with live listeners outstanding"
        );
    }

    pub fn note_endpoint_opened(&self) {
        self.live_endpoints.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_endpoint_closed(&self) {
        self.live_endpoints.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.debug_assert_quiescent();
    }
}
