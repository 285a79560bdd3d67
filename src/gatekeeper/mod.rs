//! Connection admission: context and verdict types plus pipeline wiring.

mod address;
mod allowlist;
mod link;
pub mod message;

pub use address::{AddressBlockerProcessor, Blocker, ADDRESS_BLOCKED_COOLDOWN};
pub use allowlist::{AddressAllowlist, NoopAllowlist, StaticAllowlist};
pub use link::{LinkDetectionProcessor, LINK_DETECTED_COOLDOWN};
pub use message::Message;

use crate::config::Config;
use crate::pipeline::{Priority, Processor, ProcessorPipeline, Verdict};
use reqwest::Client;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Stable player identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerId {
    pub uuid: String,
    pub usid: String,
}

impl PlayerId {
    pub fn new(uuid: impl Into<String>, usid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            usid: usid.into(),
        }
    }
}

/// Everything known about a connection when it asks to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatekeeperContext {
    pub name: String,
    pub player: PlayerId,
    pub address: IpAddr,
    pub locale: String,
}

impl fmt::Display for GatekeeperContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name={}, uuid={}, address={}",
            self.name, self.player.uuid, self.address
        )
    }
}

/// Admission verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatekeeperResult {
    Success,
    Failure { reason: Message, cooldown: Duration },
}

impl GatekeeperResult {
    pub fn failure(reason: Message, cooldown: Duration) -> Self {
        GatekeeperResult::Failure { reason, cooldown }
    }
}

impl Verdict for GatekeeperResult {
    fn pass() -> Self {
        GatekeeperResult::Success
    }

    fn is_failure(&self) -> bool {
        matches!(self, GatekeeperResult::Failure { .. })
    }
}

/// Trait object type under which admission processors are registered.
pub type GatekeeperProcessor = dyn Processor<GatekeeperContext, GatekeeperResult>;

pub type GatekeeperPipeline = ProcessorPipeline<GatekeeperContext, GatekeeperResult>;

pub const ADDRESS_BLOCKER: &str = "address-blocker";
pub const LINK_DETECTION: &str = "link-detection";

/// Build the admission pipeline from configuration.
///
/// Callers may register further processors on the returned pipeline.
pub async fn build_pipeline(config: &Config, http: &Client) -> anyhow::Result<GatekeeperPipeline> {
    if !config.gatekeeper.enabled {
        info!("Gatekeeper disabled, admitting every connection");
        return Ok(GatekeeperPipeline::new());
    }

    let allowlist: Arc<dyn AddressAllowlist> = if config.allowlist.is_empty() {
        Arc::new(NoopAllowlist)
    } else {
        Arc::new(StaticAllowlist::from_config(config))
    };

    let blocker = Blocker::from_config(&config.gatekeeper.filters.address, http).await?;
    let pipeline = assemble(blocker, allowlist, config.gatekeeper.filters.link)?;

    info!(
        processors = ?pipeline.names().collect::<Vec<_>>(),
        "Gatekeeper pipeline ready"
    );

    Ok(pipeline)
}

/// Register the built-in processors. The address blocker goes before the
/// link detector at the same priority, so a blocked address is reported
/// ahead of a link in the name.
pub fn assemble(
    blocker: Blocker,
    allowlist: Arc<dyn AddressAllowlist>,
    link_detection: bool,
) -> Result<GatekeeperPipeline, regex::Error> {
    let mut pipeline = GatekeeperPipeline::new();

    pipeline.register(
        ADDRESS_BLOCKER,
        Priority::Normal,
        AddressBlockerProcessor::new(blocker, allowlist),
    );

    if link_detection {
        pipeline.register(LINK_DETECTION, Priority::Normal, LinkDetectionProcessor::new()?);
    }

    Ok(pipeline)
}
