//! Address classification backends.

pub mod reputation;
pub mod static_blocker;

use async_trait::async_trait;
use std::net::IpAddr;
use thiserror::Error;

pub use reputation::ReputationAddressBlocker;
pub use static_blocker::{ProviderHealth, ProviderReport, StaticAddressBlocker};

/// Error from an address blocker lookup.
#[derive(Debug, Error)]
pub enum BlockerError {
    /// The reputation service refused the request with HTTP 429.
    #[error("rate limited by reputation service")]
    RateLimited,
    /// The reputation service answered with an unexpected status.
    #[error("unexpected status code: {0}")]
    Status(u16),
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response did not contain a verdict.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Decides whether an address belongs to a disallowed category.
#[async_trait]
pub trait AddressBlocker: Send + Sync {
    async fn blocked(&self, ip: &IpAddr) -> Result<bool, BlockerError>;
}

/// Loopback and unspecified addresses are never checked.
pub fn is_local(ip: &IpAddr) -> bool {
    let ip = ip.to_canonical();
    ip.is_loopback() || ip.is_unspecified()
}
