//! Cloud vendors that publish their address space as a JSON document.

use super::{get_json, parse_ranges, FetchError, RangeProvider};
use crate::range::AddressRange;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

pub const GITHUB_ACTIONS: &str = "github-actions";
pub const AMAZON_WEB_SERVICES: &str = "amazon-web-services";
pub const GOOGLE: &str = "google";
pub const ORACLE: &str = "oracle";

const GITHUB_META_URL: &str = "https://api.github.com/meta";
const AWS_RANGES_URL: &str = "https://ip-ranges.amazonaws.com/ip-ranges.json";
const GOOGLE_CLOUD_URL: &str = "https://www.gstatic.com/ipranges/cloud.json";
const ORACLE_RANGES_URL: &str = "https://docs.cloud.oracle.com/en-us/iaas/tools/public_ip_ranges.json";

/// GitHub's `/meta` document, reduced to the Actions runners.
#[derive(Debug, Deserialize)]
struct GithubMeta {
    actions: Vec<String>,
}

/// GitHub Actions runner addresses.
#[derive(Debug, Clone)]
pub struct GithubActionsProvider {
    url: String,
}

impl GithubActionsProvider {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for GithubActionsProvider {
    fn default() -> Self {
        Self::with_url(GITHUB_META_URL)
    }
}

#[async_trait]
impl RangeProvider for GithubActionsProvider {
    fn name(&self) -> &str {
        GITHUB_ACTIONS
    }

    async fn fetch(&self, http: &Client) -> Result<Vec<AddressRange>, FetchError> {
        let meta: GithubMeta = get_json(http, self.name(), &self.url).await?;
        parse_ranges(self.name(), &self.url, meta.actions.iter().map(String::as_str))
    }
}

#[derive(Debug, Deserialize)]
struct AwsRanges {
    prefixes: Vec<AwsPrefix>,
    ipv6_prefixes: Vec<AwsIpv6Prefix>,
}

#[derive(Debug, Deserialize)]
struct AwsPrefix {
    ip_prefix: String,
}

#[derive(Debug, Deserialize)]
struct AwsIpv6Prefix {
    ipv6_prefix: String,
}

/// Amazon Web Services, both IPv4 and IPv6 prefixes.
#[derive(Debug, Clone)]
pub struct AmazonWebServicesProvider {
    url: String,
}

impl AmazonWebServicesProvider {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for AmazonWebServicesProvider {
    fn default() -> Self {
        Self::with_url(AWS_RANGES_URL)
    }
}

#[async_trait]
impl RangeProvider for AmazonWebServicesProvider {
    fn name(&self) -> &str {
        AMAZON_WEB_SERVICES
    }

    async fn fetch(&self, http: &Client) -> Result<Vec<AddressRange>, FetchError> {
        let doc: AwsRanges = get_json(http, self.name(), &self.url).await?;
        let v4 = doc.prefixes.iter().map(|p| p.ip_prefix.as_str());
        let v6 = doc.ipv6_prefixes.iter().map(|p| p.ipv6_prefix.as_str());
        parse_ranges(self.name(), &self.url, v4.chain(v6))
    }
}

#[derive(Debug, Deserialize)]
struct GoogleRanges {
    prefixes: Vec<GooglePrefix>,
}

#[derive(Debug, Deserialize)]
struct GooglePrefix {
    #[serde(rename = "ipv4Prefix", default)]
    ipv4_prefix: Option<String>,
    #[serde(rename = "ipv6Prefix", default)]
    ipv6_prefix: Option<String>,
}

/// Google Cloud.
#[derive(Debug, Clone)]
pub struct GoogleCloudProvider {
    url: String,
}

impl GoogleCloudProvider {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for GoogleCloudProvider {
    fn default() -> Self {
        Self::with_url(GOOGLE_CLOUD_URL)
    }
}

#[async_trait]
impl RangeProvider for GoogleCloudProvider {
    fn name(&self) -> &str {
        GOOGLE
    }

    async fn fetch(&self, http: &Client) -> Result<Vec<AddressRange>, FetchError> {
        let doc: GoogleRanges = get_json(http, self.name(), &self.url).await?;

        let literals = doc.prefixes.iter().filter_map(|p| {
            let prefix = p.ipv4_prefix.as_deref().or(p.ipv6_prefix.as_deref());
            if prefix.is_none() {
                warn!(provider = GOOGLE, "Skipping prefix entry without an address");
            }
            prefix
        });

        parse_ranges(self.name(), &self.url, literals)
    }
}

#[derive(Debug, Deserialize)]
struct OracleRanges {
    regions: Vec<OracleRegion>,
}

#[derive(Debug, Deserialize)]
struct OracleRegion {
    #[serde(default)]
    region: Option<String>,
    cidrs: Vec<OracleCidr>,
}

#[derive(Debug, Deserialize)]
struct OracleCidr {
    cidr: String,
}

/// Oracle Cloud, every region.
#[derive(Debug, Clone)]
pub struct OracleCloudProvider {
    url: String,
}

impl OracleCloudProvider {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for OracleCloudProvider {
    fn default() -> Self {
        Self::with_url(ORACLE_RANGES_URL)
    }
}

#[async_trait]
impl RangeProvider for OracleCloudProvider {
    fn name(&self) -> &str {
        ORACLE
    }

    async fn fetch(&self, http: &Client) -> Result<Vec<AddressRange>, FetchError> {
        let doc: OracleRanges = get_json(http, self.name(), &self.url).await?;
        debug!(
            provider = ORACLE,
            regions = doc.regions.len(),
            first = ?doc.regions.first().and_then(|r| r.region.as_deref()),
            "Decoded region list"
        );

        let literals = doc
            .regions
            .iter()
            .flat_map(|region| region.cidrs.iter().map(|c| c.cidr.as_str()));
        parse_ranges(self.name(), &self.url, literals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(&server)
            .await;
        server
    }

    fn covers(ranges: &[AddressRange], ip: &str) -> bool {
        let ip: IpAddr = ip.parse().unwrap();
        ranges.iter().any(|r| r.contains(&ip))
    }

    #[tokio::test]
    async fn test_github_actions() {
        let server = serve(r#"{"verifiable_password_authentication": false, "actions": ["4.148.0.0/16", "2a01:111:f403::/48"], "web": ["140.82.112.0/20"]}"#).await;

        let ranges = GithubActionsProvider::with_url(server.uri())
            .fetch(&Client::new())
            .await
            .unwrap();

        assert_eq!(ranges.len(), 2);
        assert!(covers(&ranges, "4.148.1.1"));
        assert!(!covers(&ranges, "140.82.112.1"));
    }

    #[tokio::test]
    async fn test_aws_unions_both_families() {
        let server = serve(
            r#"{
                "syncToken": "1",
                "prefixes": [{"ip_prefix": "3.5.140.0/22", "region": "ap-northeast-2", "service": "AMAZON"}],
                "ipv6_prefixes": [{"ipv6_prefix": "2600:1f00::/24", "region": "us-east-1", "service": "AMAZON"}]
            }"#,
        )
        .await;

        let ranges = AmazonWebServicesProvider::with_url(server.uri())
            .fetch(&Client::new())
            .await
            .unwrap();

        assert_eq!(ranges.len(), 2);
        assert!(covers(&ranges, "3.5.141.7"));
        assert!(covers(&ranges, "2600:1f00::1"));
    }

    #[tokio::test]
    async fn test_google_mixed_prefixes() {
        let server = serve(
            r#"{"prefixes": [
                {"ipv4Prefix": "34.1.208.0/20", "service": "Google Cloud", "scope": "africa-south1"},
                {"ipv6Prefix": "2600:1900:8000::/44", "service": "Google Cloud"},
                {"service": "Google Cloud"}
            ]}"#,
        )
        .await;

        let ranges = GoogleCloudProvider::with_url(server.uri())
            .fetch(&Client::new())
            .await
            .unwrap();

        assert_eq!(ranges.len(), 2);
        assert!(covers(&ranges, "34.1.210.1"));
        assert!(covers(&ranges, "2600:1900:8000::5"));
    }

    #[tokio::test]
    async fn test_oracle_regions() {
        let server = serve(
            r#"{"last_updated_timestamp": "2024", "regions": [
                {"region": "us-phoenix-1", "cidrs": [{"cidr": "129.146.0.0/21", "tags": ["OCI"]}]},
                {"region": "eu-frankfurt-1", "cidrs": [{"cidr": "130.61.0.0/16", "tags": ["OCI"]}, {"cidr": "138.1.0.0/20", "tags": ["OSN"]}]}
            ]}"#,
        )
        .await;

        let ranges = OracleCloudProvider::with_url(server.uri())
            .fetch(&Client::new())
            .await
            .unwrap();

        assert_eq!(ranges.len(), 3);
        assert!(covers(&ranges, "130.61.5.5"));
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_decode_error() {
        let server = serve(r#"{"something": "else"}"#).await;

        let err = AmazonWebServicesProvider::with_url(server.uri())
            .fetch(&Client::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Decode { .. }));
        assert_eq!(err.provider(), "amazon-web-services");
    }
}
