//! Plain-text CIDR list providers (one range per line).

use super::{get_text, parse_ranges, FetchError, RangeProvider};
use crate::range::AddressRange;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

pub const X4BNET_DATACENTER: &str = "x4bnet-datacenter";
pub const X4BNET_VPN: &str = "x4bnet-vpn";

const X4BNET_DATACENTER_URL: &str =
    "https://raw.githubusercontent.com/X4BNet/lists_vpn/main/output/datacenter/ipv4.txt";
const X4BNET_VPN_URL: &str =
    "https://raw.githubusercontent.com/X4BNet/lists_vpn/main/output/vpn/ipv4.txt";

/// Provider for a newline-delimited list of CIDR blocks.
#[derive(Debug, Clone)]
pub struct CidrListProvider {
    name: String,
    url: String,
}

impl CidrListProvider {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// X4BNet's datacenter IPv4 list.
    pub fn x4bnet_datacenter() -> Self {
        Self::new(X4BNET_DATACENTER, X4BNET_DATACENTER_URL)
    }

    /// X4BNet's VPN IPv4 list.
    pub fn x4bnet_vpn() -> Self {
        Self::new(X4BNET_VPN, X4BNET_VPN_URL)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RangeProvider for CidrListProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, http: &Client) -> Result<Vec<AddressRange>, FetchError> {
        let body = get_text(http, &self.name, &self.url).await?;
        let ranges = parse_ranges(&self.name, &self.url, body.lines())?;
        debug!(provider = %self.name, ranges = ranges.len(), "Decoded CIDR list");
        Ok(ranges)
    }
}
