//! Typed engine configuration.
//!
//! The engine façade only ever needs a handful of keys, so this is a plain struct with
//! a builder rather than an untyped channel-args map.

use std::time::Duration;

/// Construction-time configuration for an [`crate::engine::Engine`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Root byte budget for the memory quota tree (`resource_quota`).
    pub resource_quota_bytes: usize,
    /// Number of worker threads backing the task scheduler. `None` defers to the
    /// runtime's own default (typically the host's core count).
    pub worker_threads: Option<usize>,
    /// Grace period an endpoint waits with no active calls before closing itself.
    pub idle_timeout: Duration,
    /// Default deadline applied to an outbound connect when the caller doesn't supply
    /// one explicitly.
    pub default_connect_timeout: Duration,
    /// Path to a resolver configuration file, mirroring `/etc/resolv.conf`; `None`
    /// means "use the resolver's own platform default".
    pub resolver_config_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            resource_quota_bytes: 64 * 1024 * 1024,
            worker_threads: None,
            idle_timeout: Duration::from_secs(30 * 60),
            default_connect_timeout: Duration::from_secs(20),
            resolver_config_path: None,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

#[derive(Clone, Debug, Default)]
pub struct EngineConfigBuilder {
    config: Option<EngineConfig>,
}

impl EngineConfigBuilder {
    fn config_mut(&mut self) -> &mut EngineConfig {
        self.config.get_or_insert_with(EngineConfig::default)
    }

    pub fn resource_quota_bytes(mut self, bytes: usize) -> Self {
        self.config_mut().resource_quota_bytes = bytes;
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config_mut().worker_threads = Some(threads);
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config_mut().idle_timeout = timeout;
        self
    }

    pub fn default_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config_mut().default_connect_timeout = timeout;
        self
    }

    pub fn resolver_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_mut().resolver_config_path = Some(path.into());
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = EngineConfig::builder()
            .resource_quota_bytes(1024)
            .idle_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.resource_quota_bytes, 1024);
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.default_connect_timeout, Duration::from_secs(20));
    }
}
