//! `hickory-resolver`-backed implementation of [`engine_core::DnsResolver`].

use engine_core::dns::{DnsResolver, HostnameResult, SrvRecord, TxtRecord};
use engine_core::error::{EngineError, Result};
use engine_core::ResolvedAddress;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;

pub struct HickoryDnsResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryDnsResolver {
    /// Builds a resolver from the platform's default configuration (`/etc/resolv.conf`
    /// on Unix).
    pub fn from_system_conf() -> Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|err| EngineError::Internal(err.to_string()))?;
        Ok(HickoryDnsResolver { resolver })
    }

    pub fn new(config: ResolverConfig, opts: ResolverOpts) -> Self {
        HickoryDnsResolver {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

#[async_trait::async_trait]
impl DnsResolver for HickoryDnsResolver {
    async fn resolve_hostname(&self, hostname: &str) -> Result<HostnameResult> {
        let lookup = self
            .resolver
            .lookup_ip(hostname)
            .await
            .map_err(|err| EngineError::Internal(crate::error::resolve_error_to_status(err).to_string()))?;
        let addresses = lookup
            .iter()
            .map(ResolvedAddress::from_ip)
            .collect::<Vec<_>>();
        Ok(HostnameResult::addresses_only(addresses))
    }

    async fn resolve_srv(&self, service: &str) -> Result<Vec<SrvRecord>> {
        let lookup = self
            .resolver
            .lookup(service, RecordType::SRV)
            .await
            .map_err(|err| EngineError::Internal(crate::error::resolve_error_to_status(err).to_string()))?;
        let records = lookup
            .record_iter()
            .filter_map(|record| match record.data() {
                Some(RData::SRV(srv)) => Some(SrvRecord {
                    target: srv.target().to_utf8(),
                    port: srv.port(),
                    priority: srv.priority(),
                    weight: srv.weight(),
                }),
                _ => None,
            })
            .collect();
        Ok(records)
    }

    async fn resolve_txt(&self, hostname: &str) -> Result<Vec<TxtRecord>> {
        let lookup = self
            .resolver
            .txt_lookup(hostname)
            .await
            .map_err(|err| EngineError::Internal(crate::error::resolve_error_to_status(err).to_string()))?;
        let records = lookup
            .iter()
            .map(|txt| TxtRecord(txt.txt_data().concat()))
            .collect();
        Ok(records)
    }
}

trait FromIp {
    fn from_ip(ip: std::net::IpAddr) -> ResolvedAddress;
}

impl FromIp for ResolvedAddress {
    fn from_ip(ip: std::net::IpAddr) -> ResolvedAddress {
        ResolvedAddress::from(std::net::SocketAddr::new(ip, 0))
    }
}
