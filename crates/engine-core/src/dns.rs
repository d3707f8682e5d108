//! Runtime-agnostic DNS resolution contract.
//!
//! `engine-core` declares only the trait and result shapes; `engine-transport-tcp`
//! supplies the concrete `hickory-resolver`-backed implementation. Keeping the trait
//! here (rather than behind a feature flag) lets `Endpoint`/`Connector` code in this
//! crate depend on "a resolver" without depending on Tokio.

use crate::address::ResolvedAddress;
use crate::error::Result;

/// A single SRV record, used when resolving service names rather than bare
/// hostnames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SrvRecord {
    pub target: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
}

/// A DNS TXT record, returned verbatim as raw bytes since TXT content has no fixed
/// schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxtRecord(pub Vec<u8>);

/// The result of resolving a hostname: zero or more addresses plus whatever SRV/TXT
/// records were requested alongside it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostnameResult {
    pub addresses: Vec<ResolvedAddress>,
    pub srv_records: Vec<SrvRecord>,
    pub txt_records: Vec<TxtRecord>,
}

impl HostnameResult {
    pub fn addresses_only(addresses: Vec<ResolvedAddress>) -> Self {
        HostnameResult {
            addresses,
            srv_records: Vec::new(),
            txt_records: Vec::new(),
        }
    }
}

/// A live, outstanding lookup that can be cancelled before it completes.
pub trait LookupHandle: Send {
    fn cancel(&self);
}

/// Contract for the DNS Resolver component.
///
/// Implementations are expected to be async under the hood; `#[async_trait]` boxes the
/// returned future so the trait stays object-safe and usable from `Endpoint`/`Connector`
/// code that only holds a `dyn DnsResolver`.
#[async_trait::async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve_hostname(&self, hostname: &str) -> Result<HostnameResult>;

    async fn resolve_srv(&self, service: &str) -> Result<Vec<SrvRecord>>;

    async fn resolve_txt(&self, hostname: &str) -> Result<Vec<TxtRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_only_leaves_other_fields_empty() {
        let result = HostnameResult::addresses_only(vec![]);
        assert!(result.srv_records.is_empty());
        assert!(result.txt_records.is_empty());
    }
}
