//! Address filter: rejects connections from disallowed networks.

use super::allowlist::AddressAllowlist;
use super::message::{self, Message};
use super::{GatekeeperContext, GatekeeperResult};
use crate::blocker::{is_local, AddressBlocker, BlockerError, ReputationAddressBlocker, StaticAddressBlocker};
use crate::config::AddressBlockerConfig;
use crate::pipeline::Processor;
use async_trait::async_trait;
use reqwest::Client;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How long a rejected player must wait before reconnecting.
pub const ADDRESS_BLOCKED_COOLDOWN: Duration = Duration::from_secs(10);

/// The backend chosen at startup. Fixed for the process lifetime.
pub enum Blocker {
    None,
    Reputation(ReputationAddressBlocker),
    Static(StaticAddressBlocker),
}

impl Blocker {
    /// Build the configured backend. Static ranges are fully fetched before
    /// this returns.
    pub async fn from_config(config: &AddressBlockerConfig, http: &Client) -> Result<Self, regex::Error> {
        let blocker = match config {
            AddressBlockerConfig::None => {
                info!("Address blocker disabled");
                Blocker::None
            }
            AddressBlockerConfig::Reputation(reputation) => {
                info!(endpoint = %reputation.endpoint, "Reputation address blocker enabled");
                Blocker::Reputation(ReputationAddressBlocker::new(reputation.clone(), http.clone()))
            }
            AddressBlockerConfig::Static(static_config) => {
                let blocker = StaticAddressBlocker::new(static_config, http).await?;
                info!(ranges = blocker.ranges().len(), "Static address blocker enabled");
                Blocker::Static(blocker)
            }
        };
        Ok(blocker)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Blocker::None)
    }

    async fn blocked(&self, ip: &IpAddr) -> Result<bool, BlockerError> {
        match self {
            Blocker::None => Ok(false),
            Blocker::Reputation(blocker) => blocker.blocked(ip).await,
            Blocker::Static(blocker) => blocker.blocked(ip).await,
        }
    }
}

/// Address blocker processor.
pub struct AddressBlockerProcessor {
    blocker: Blocker,
    allowlist: Arc<dyn AddressAllowlist>,
}

impl AddressBlockerProcessor {
    pub fn new(blocker: Blocker, allowlist: Arc<dyn AddressAllowlist>) -> Self {
        Self { blocker, allowlist }
    }
}

#[async_trait]
impl Processor<GatekeeperContext, GatekeeperResult> for AddressBlockerProcessor {
    async fn process(&self, context: &GatekeeperContext) -> anyhow::Result<GatekeeperResult> {
        let address = &context.address;

        if self.blocker.is_none() || is_local(address) {
            return Ok(GatekeeperResult::Success);
        }

        if self.allowlist.whitelisted(address).await {
            debug!(ip = %address, "Address is allowlisted");
            return Ok(GatekeeperResult::Success);
        }

        if self.blocker.blocked(address).await? {
            info!(ip = %address, name = %context.name, "Blocked address");
            Ok(GatekeeperResult::failure(
                Message::translatable(message::ADDRESS_BLOCKED, vec![address.to_string()]),
                ADDRESS_BLOCKED_COOLDOWN,
            ))
        } else {
            Ok(GatekeeperResult::Success)
        }
    }
}
