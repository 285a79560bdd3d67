//! Blocker backed by published cloud and VPN address ranges.

use super::{AddressBlocker, BlockerError};
use crate::config::StaticBlockerConfig;
use crate::providers::{self, FetchError, RangeProvider};
use crate::range::RangeSet;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Outcome of one provider fetch.
#[derive(Debug)]
pub enum ProviderHealth {
    /// Fetched and decoded; `ranges` may legitimately be zero.
    Loaded { ranges: usize },
    /// Transport, status or decode failure.
    Failed(FetchError),
    /// Did not finish within the fetch timeout.
    TimedOut,
}

impl ProviderHealth {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ProviderHealth::Loaded { .. })
    }
}

/// Per-provider fetch outcome kept for diagnostics.
#[derive(Debug)]
pub struct ProviderReport {
    pub provider: String,
    pub health: ProviderHealth,
}

/// Static address blocker.
///
/// The range set is assembled once during construction and only read
/// afterwards.
pub struct StaticAddressBlocker {
    ranges: RangeSet,
    reports: Vec<ProviderReport>,
}

impl StaticAddressBlocker {
    /// Fetch the configured providers and assemble the range set.
    pub async fn new(config: &StaticBlockerConfig, http: &Client) -> Result<Self, regex::Error> {
        let providers = providers::select(&config.providers)?;
        let timeout = Duration::from_secs(config.fetch_timeout_seconds);
        Ok(Self::from_providers(providers, http, timeout).await)
    }

    /// Fetch `providers` concurrently, each bounded by `timeout`.
    ///
    /// A failing provider contributes no ranges and never affects the others.
    pub async fn from_providers(
        providers: Vec<Box<dyn RangeProvider>>,
        http: &Client,
        timeout: Duration,
    ) -> Self {
        if providers.is_empty() {
            debug!("No providers configured, skipping fetching blocked addresses");
            return Self {
                ranges: RangeSet::new(),
                reports: Vec::new(),
            };
        }

        debug!(providers = providers.len(), "Fetching blocked addresses");

        let fetches = providers.iter().map(|provider| async move {
            let outcome = tokio::time::timeout(timeout, provider.fetch(http)).await;
            (provider.name().to_string(), outcome)
        });

        let mut ranges = RangeSet::new();
        let mut reports = Vec::with_capacity(providers.len());

        for (provider, outcome) in join_all(fetches).await {
            let health = match outcome {
                Ok(Ok(list)) => {
                    debug!(provider = %provider, ranges = list.len(), "Fetched address ranges");
                    let count = list.len();
                    ranges.extend(list);
                    ProviderHealth::Loaded { ranges: count }
                }
                Ok(Err(e)) => {
                    error!(
                        provider = %provider,
                        target = e.target(),
                        status = ?e.status(),
                        error = %e,
                        "Failed to fetch address ranges"
                    );
                    ProviderHealth::Failed(e)
                }
                Err(_) => {
                    warn!(
                        provider = %provider,
                        timeout_ms = timeout.as_millis() as u64,
                        "Timed out fetching address ranges"
                    );
                    ProviderHealth::TimedOut
                }
            };
            reports.push(ProviderReport { provider, health });
        }

        let loaded = reports.iter().filter(|r| r.health.is_loaded()).count();
        info!(
            providers = reports.len(),
            loaded = loaded,
            failed = reports.len() - loaded,
            ranges = ranges.len(),
            "Static address blocklist ready"
        );

        Self { ranges, reports }
    }

    /// Blocker over an already assembled range set.
    pub fn from_ranges(ranges: RangeSet) -> Self {
        Self {
            ranges,
            reports: Vec::new(),
        }
    }

    /// Check if an address lies in any fetched range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.ranges.contains(ip)
    }

    pub fn ranges(&self) -> &RangeSet {
        &self.ranges
    }

    /// Fetch outcome of every selected provider.
    pub fn health(&self) -> &[ProviderReport] {
        &self.reports
    }
}

#[async_trait]
impl AddressBlocker for StaticAddressBlocker {
    async fn blocked(&self, ip: &IpAddr) -> Result<bool, BlockerError> {
        Ok(self.contains(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CidrListProvider;
    use crate::range::AddressRange;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Provider that never finishes.
    struct StalledProvider;

    #[async_trait]
    impl RangeProvider for StalledProvider {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn fetch(&self, _http: &Client) -> Result<Vec<AddressRange>, FetchError> {
            futures::future::pending().await
        }
    }

    async fn list_server(body: &str, status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.txt"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body.to_string()))
            .mount(&server)
            .await;
        server
    }

    fn list_provider(name: &str, server: &MockServer) -> Box<dyn RangeProvider> {
        Box::new(CidrListProvider::new(name, format!("{}/list.txt", server.uri())))
    }

    #[tokio::test]
    async fn test_single_provider_membership() {
        let server = list_server("1.2.3.0/24\n", 200).await;

        let blocker = StaticAddressBlocker::from_providers(
            vec![list_provider("test", &server)],
            &Client::new(),
            Duration::from_secs(10),
        )
        .await;

        assert!(blocker.blocked(&"1.2.3.100".parse().unwrap()).await.unwrap());
        assert!(!blocker.blocked(&"1.2.4.1".parse().unwrap()).await.unwrap());
        assert!(matches!(blocker.health()[0].health, ProviderHealth::Loaded { ranges: 1 }));
    }

    #[tokio::test]
    async fn test_failures_do_not_affect_other_providers() {
        let good = list_server("10.0.0.0/8\n", 200).await;
        let bad = list_server("", 503).await;

        let blocker = StaticAddressBlocker::from_providers(
            vec![
                list_provider("bad", &bad),
                Box::new(StalledProvider),
                list_provider("good", &good),
            ],
            &Client::new(),
            Duration::from_millis(500),
        )
        .await;

        assert!(blocker.contains(&"10.20.30.40".parse().unwrap()));

        let health = blocker.health();
        assert_eq!(health.len(), 3);
        assert!(matches!(&health[0].health, ProviderHealth::Failed(e) if e.status() == Some(503)));
        assert!(matches!(health[1].health, ProviderHealth::TimedOut));
        assert_eq!(health[1].provider, "stalled");
        assert!(health[2].health.is_loaded());
    }

    #[tokio::test]
    async fn test_ranges_are_unioned() {
        let a = list_server("10.0.0.0/24\n", 200).await;
        let b = list_server("10.0.1.0/24\n2001:db8::/32\n", 200).await;

        let blocker = StaticAddressBlocker::from_providers(
            vec![list_provider("a", &a), list_provider("b", &b)],
            &Client::new(),
            Duration::from_secs(10),
        )
        .await;

        assert_eq!(blocker.ranges().len(), 2);
        assert!(blocker.contains(&"10.0.1.255".parse().unwrap()));
        assert!(blocker.contains(&"2001:db8::42".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_no_providers() {
        let blocker =
            StaticAddressBlocker::from_providers(Vec::new(), &Client::new(), Duration::from_secs(10)).await;
        assert!(blocker.ranges().is_empty());
        assert!(blocker.health().is_empty());
        assert!(!blocker.contains(&"1.2.3.4".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_new_with_unmatched_selection() {
        let config = StaticBlockerConfig {
            providers: vec!["does-not-exist".to_string()],
            fetch_timeout_seconds: 10,
        };
        let blocker = StaticAddressBlocker::new(&config, &Client::new()).await.unwrap();
        assert!(blocker.health().is_empty());
    }
}
