//! Azure public cloud ranges.
//!
//! Microsoft does not publish a stable URL for the service tags file. The
//! download page is fetched first and the dated JSON link is taken from it.

use super::{get_json, get_text, parse_ranges, FetchError, RangeProvider};
use crate::range::AddressRange;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub const NAME: &str = "azure";

const DOWNLOAD_PAGE_URL: &str = "https://www.microsoft.com/en-us/download/confirmation.aspx?id=56519";

/// Only the public cloud tag is used; regional tags are subsets of it.
const CLOUD_TAG: &str = "AzureCloud";

const DATA_LINK_PATTERN: &str = r#"https?://[^"'\s<>]*ServiceTags_Public[^"'\s<>]*\.json"#;

#[derive(Debug, Deserialize)]
struct ServiceTags {
    values: Vec<ServiceTag>,
}

#[derive(Debug, Deserialize)]
struct ServiceTag {
    name: String,
    properties: ServiceTagProperties,
}

#[derive(Debug, Deserialize)]
struct ServiceTagProperties {
    #[serde(rename = "addressPrefixes")]
    address_prefixes: Vec<String>,
}

/// Azure provider with a discovery step.
#[derive(Debug, Clone)]
pub struct AzureProvider {
    download_page_url: String,
    data_link: Regex,
}

impl AzureProvider {
    /// Provider reading Microsoft's public download page.
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_download_page(DOWNLOAD_PAGE_URL)
    }

    /// Use a different download page, e.g. a mirror.
    pub fn with_download_page(url: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            download_page_url: url.into(),
            data_link: Regex::new(DATA_LINK_PATTERN)?,
        })
    }

    /// First service tags JSON link on the page.
    fn find_data_link(&self, page: &str) -> Option<String> {
        self.data_link.find(page).map(|m| m.as_str().to_string())
    }

    async fn discover(&self, http: &Client) -> Result<String, FetchError> {
        let page = get_text(http, NAME, &self.download_page_url).await?;
        self.find_data_link(&page).ok_or_else(|| FetchError::Discovery {
            provider: NAME.to_string(),
            target: self.download_page_url.clone(),
        })
    }
}

#[async_trait]
impl RangeProvider for AzureProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, http: &Client) -> Result<Vec<AddressRange>, FetchError> {
        let data_url = self.discover(http).await?;
        debug!(provider = NAME, url = %data_url, "Discovered service tags file");

        let tags: ServiceTags = get_json(http, NAME, &data_url).await?;
        let literals = tags
            .values
            .iter()
            .filter(|tag| tag.name == CLOUD_TAG)
            .flat_map(|tag| tag.properties.address_prefixes.iter().map(String::as_str));

        parse_ranges(NAME, &data_url, literals)
    }
}
