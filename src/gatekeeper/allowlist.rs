//! Explicitly trusted addresses.

use crate::config::{AllowlistEntry, Config};
use async_trait::async_trait;
use std::net::IpAddr;

/// Reports whether an address is explicitly trusted.
///
/// Implementations may consult external state, hence async.
#[async_trait]
pub trait AddressAllowlist: Send + Sync {
    async fn whitelisted(&self, ip: &IpAddr) -> bool;
}

/// Allowlist that trusts nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAllowlist;

#[async_trait]
impl AddressAllowlist for NoopAllowlist {
    async fn whitelisted(&self, _ip: &IpAddr) -> bool {
        false
    }
}

/// Allowlist built from configured addresses and networks.
#[derive(Debug, Clone, Default)]
pub struct StaticAllowlist {
    entries: Vec<AllowlistEntry>,
}

impl StaticAllowlist {
    pub fn new(entries: Vec<AllowlistEntry>) -> Self {
        Self { entries }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.parse_allowlist())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AddressAllowlist for StaticAllowlist {
    async fn whitelisted(&self, ip: &IpAddr) -> bool {
        self.entries.iter().any(|entry| entry.contains(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_allowlist() {
        assert!(!NoopAllowlist.whitelisted(&"1.2.3.4".parse().unwrap()).await);
    }

    #[tokio::test]
    async fn test_static_allowlist() {
        let config = Config {
            allowlist: vec!["203.0.113.7".to_string(), "198.51.100.0/24".to_string()],
            ..Config::default()
        };
        let allowlist = StaticAllowlist::from_config(&config);
        assert_eq!(allowlist.len(), 2);

        assert!(allowlist.whitelisted(&"203.0.113.7".parse().unwrap()).await);
        assert!(allowlist.whitelisted(&"198.51.100.200".parse().unwrap()).await);
        assert!(!allowlist.whitelisted(&"203.0.113.8".parse().unwrap()).await);
    }
}
