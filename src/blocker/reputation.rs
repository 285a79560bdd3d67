//! Blocker backed by a live VPN/proxy reputation service.

use super::{is_local, AddressBlocker, BlockerError};
use crate::cache::VerdictCache;
use crate::config::ReputationBlockerConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

/// Reputation API response, reduced to the verdict.
#[derive(Debug, Deserialize)]
struct ReputationResponse {
    security: SecurityFlags,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)] // Only `vpn` drives the verdict
struct SecurityFlags {
    vpn: bool,
    #[serde(default)]
    proxy: bool,
    #[serde(default)]
    tor: bool,
    #[serde(default)]
    relay: bool,
}

/// Reputation address blocker.
pub struct ReputationAddressBlocker {
    config: ReputationBlockerConfig,
    http: Client,
    cache: VerdictCache,
}

impl ReputationAddressBlocker {
    /// Create a new reputation blocker.
    pub fn new(config: ReputationBlockerConfig, http: Client) -> Self {
        let cache = VerdictCache::new(Duration::from_secs(config.cache_ttl_seconds));
        Self {
            config,
            http,
            cache,
        }
    }

    /// Cached verdicts, for inspection.
    pub fn cache(&self) -> &VerdictCache {
        &self.cache
    }

    async fn query(&self, ip: &IpAddr) -> Result<bool, BlockerError> {
        let url = format!("{}/{}", self.config.endpoint.trim_end_matches('/'), ip);

        debug!(ip = %ip, "Querying reputation service");

        let response = self
            .http
            .get(&url)
            .query(&[("key", self.config.token.as_str())])
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            warn!(ip = %ip, "Reputation service rate limit exceeded");
            return Err(BlockerError::RateLimited);
        }

        if response.status() != StatusCode::OK {
            return Err(BlockerError::Status(response.status().as_u16()));
        }

        let body: ReputationResponse = response
            .json()
            .await
            .map_err(|e| BlockerError::Decode(format!("Failed to parse response: {}", e)))?;

        debug!(
            ip = %ip,
            vpn = body.security.vpn,
            proxy = body.security.proxy,
            tor = body.security.tor,
            "Reputation lookup complete"
        );

        Ok(body.security.vpn)
    }
}

#[async_trait]
impl AddressBlocker for ReputationAddressBlocker {
    async fn blocked(&self, ip: &IpAddr) -> Result<bool, BlockerError> {
        let ip = ip.to_canonical();
        if is_local(&ip) {
            return Ok(false);
        }

        self.cache
            .get_or_try_insert_with(ip, || self.query(&ip))
            .await
    }
}
