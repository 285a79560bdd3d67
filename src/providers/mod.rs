//! Published address-range providers.
//!
//! Each provider downloads one third party's list of address ranges and
//! decodes it. Providers share nothing but the HTTP client they are handed.

pub mod azure;
pub mod cidr_list;
pub mod cloud;

use crate::range::AddressRange;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

pub use azure::AzureProvider;
pub use cidr_list::CidrListProvider;
pub use cloud::{AmazonWebServicesProvider, GithubActionsProvider, GoogleCloudProvider, OracleCloudProvider};

/// Names of every built-in provider, in registration order.
pub const PROVIDER_NAMES: &[&str] = &[
    cidr_list::X4BNET_DATACENTER,
    cidr_list::X4BNET_VPN,
    azure::NAME,
    cloud::GITHUB_ACTIONS,
    cloud::AMAZON_WEB_SERVICES,
    cloud::GOOGLE,
    cloud::ORACLE,
];

/// Error from a range provider.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("provider '{provider}': request to {target} failed: {source}")]
    Http {
        provider: String,
        target: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("provider '{provider}': {target} returned HTTP {status}")]
    Status {
        provider: String,
        target: String,
        status: u16,
    },
    /// The body did not have the expected shape.
    #[error("provider '{provider}': could not decode {target}: {reason}")]
    Decode {
        provider: String,
        target: String,
        reason: String,
    },
    /// An index page did not contain the expected data link.
    #[error("provider '{provider}': no data link found on {target}")]
    Discovery { provider: String, target: String },
}

impl FetchError {
    /// Name of the provider that failed.
    pub fn provider(&self) -> &str {
        match self {
            FetchError::Http { provider, .. }
            | FetchError::Status { provider, .. }
            | FetchError::Decode { provider, .. }
            | FetchError::Discovery { provider, .. } => provider,
        }
    }

    /// URL of the request that failed.
    pub fn target(&self) -> &str {
        match self {
            FetchError::Http { target, .. }
            | FetchError::Status { target, .. }
            | FetchError::Decode { target, .. }
            | FetchError::Discovery { target, .. } => target,
        }
    }

    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A named source of address ranges.
#[async_trait]
pub trait RangeProvider: Send + Sync {
    /// Stable lowercase name used in configuration and logs.
    fn name(&self) -> &str;

    /// Download and decode this provider's ranges.
    async fn fetch(&self, http: &Client) -> Result<Vec<AddressRange>, FetchError>;
}

/// User agent sent with every outgoing request. Some endpoints, such as
/// GitHub's API, reject requests without one.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// HTTP client for providers and reputation lookups.
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder().user_agent(USER_AGENT).build()
}

/// Every built-in provider pointing at its public endpoint.
pub fn builtin() -> Result<Vec<Box<dyn RangeProvider>>, regex::Error> {
    let providers: Vec<Box<dyn RangeProvider>> = vec![
        Box::new(CidrListProvider::x4bnet_datacenter()),
        Box::new(CidrListProvider::x4bnet_vpn()),
        Box::new(AzureProvider::new()?),
        Box::new(GithubActionsProvider::default()),
        Box::new(AmazonWebServicesProvider::default()),
        Box::new(GoogleCloudProvider::default()),
        Box::new(OracleCloudProvider::default()),
    ];
    Ok(providers)
}

/// Built-in providers matching `names`, compared case-insensitively.
/// An empty list selects every provider.
pub fn select(names: &[String]) -> Result<Vec<Box<dyn RangeProvider>>, regex::Error> {
    Ok(builtin()?
        .into_iter()
        .filter(|provider| {
            names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(provider.name()))
        })
        .collect())
}

/// GET `url` and return the body, failing on any non-success status.
pub(crate) async fn get_text(http: &Client, provider: &str, url: &str) -> Result<String, FetchError> {
    debug!(provider = provider, url = url, "Fetching address ranges");

    let http_error = |source: reqwest::Error| FetchError::Http {
        provider: provider.to_string(),
        target: url.to_string(),
        source,
    };

    let response = http.get(url).send().await.map_err(http_error)?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            provider: provider.to_string(),
            target: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    response.text().await.map_err(http_error)
}

/// GET `url` and decode the body as JSON.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    provider: &str,
    url: &str,
) -> Result<T, FetchError> {
    let body = get_text(http, provider, url).await?;
    serde_json::from_str(&body).map_err(|e| FetchError::Decode {
        provider: provider.to_string(),
        target: url.to_string(),
        reason: e.to_string(),
    })
}

/// Parse range literals fetched from `target`, skipping blanks and `#`
/// comments. Malformed entries are logged and left out, but a body where
/// no entry parses at all is a decode failure.
pub(crate) fn parse_ranges<'a, I>(
    provider: &str,
    target: &str,
    literals: I,
) -> Result<Vec<AddressRange>, FetchError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidates = 0usize;
    let mut last_error = None;

    let ranges: Vec<AddressRange> = literals
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            candidates += 1;
            match line.parse::<AddressRange>() {
                Ok(range) => Some(range),
                Err(e) => {
                    warn!(provider = provider, error = %e, "Skipping malformed range entry");
                    last_error = Some(e);
                    None
                }
            }
        })
        .collect();

    match last_error {
        Some(e) if ranges.is_empty() => Err(FetchError::Decode {
            provider: provider.to_string(),
            target: target.to_string(),
            reason: format!("none of {} entries parsed, last: {}", candidates, e),
        }),
        _ => Ok(ranges),
    }
}
