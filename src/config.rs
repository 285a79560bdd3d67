//! Configuration types for the gatekeeper.

use crate::providers::PROVIDER_NAMES;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use tracing::debug;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Connection admission settings.
    #[serde(default)]
    pub gatekeeper: GatekeeperConfig,

    /// Addresses that are never checked by the address blocker.
    #[serde(default)]
    pub allowlist: Vec<String>,
}

/// Connection admission settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatekeeperConfig {
    /// Master enable/disable switch.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// End-to-end time limit for one connection's checks.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Checks to run.
    #[serde(default)]
    pub filters: FiltersConfig,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_seconds: default_timeout_seconds(),
            filters: FiltersConfig::default(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    10
}

/// Gatekeeper filters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FiltersConfig {
    /// Reject players whose name contains a link.
    #[serde(default = "default_true")]
    pub link: bool,

    /// Address classification backend.
    #[serde(default)]
    pub address: AddressBlockerConfig,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            link: true,
            address: AddressBlockerConfig::default(),
        }
    }
}

/// Which address blocker backs the address filter.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AddressBlockerConfig {
    /// No address classification.
    #[default]
    None,
    /// Live lookups against a reputation service.
    Reputation(ReputationBlockerConfig),
    /// Published cloud and VPN ranges fetched at startup.
    Static(StaticBlockerConfig),
}

/// Reputation service settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReputationBlockerConfig {
    /// API token (supports ${ENV_VAR} syntax).
    pub token: String,

    /// Service base URL; the address is appended as a path segment.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// How long an unused verdict stays cached.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_ms: u64,
}

fn default_endpoint() -> String {
    "https://vpnapi.io/api".to_string()
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_request_timeout() -> u64 {
    5000
}

/// Static blocklist settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StaticBlockerConfig {
    /// Enabled provider names; empty enables all.
    #[serde(default)]
    pub providers: Vec<String>,

    /// Per-provider fetch time limit.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
}

impl Default for StaticBlockerConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            fetch_timeout_seconds: default_fetch_timeout(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load configuration, falling back to defaults when the file is missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse and validate YAML, expanding environment variables first.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.gatekeeper.timeout_seconds == 0 {
            anyhow::bail!("gatekeeper.timeout_seconds must be greater than 0");
        }

        match &self.gatekeeper.filters.address {
            AddressBlockerConfig::None => {}
            AddressBlockerConfig::Reputation(reputation) => {
                if reputation.token.is_empty() {
                    anyhow::bail!("Reputation address blocker is enabled but token is empty");
                }
                if reputation.timeout_ms == 0 {
                    anyhow::bail!("Reputation timeout_ms must be greater than 0");
                }
            }
            AddressBlockerConfig::Static(static_config) => {
                if static_config.fetch_timeout_seconds == 0 {
                    anyhow::bail!("Static fetch_timeout_seconds must be greater than 0");
                }
                for name in &static_config.providers {
                    if !PROVIDER_NAMES.iter().any(|p| p.eq_ignore_ascii_case(name)) {
                        anyhow::bail!(
                            "Unknown address range provider '{}' (known: {})",
                            name,
                            PROVIDER_NAMES.join(", ")
                        );
                    }
                }
            }
        }

        for entry in &self.allowlist {
            if entry.parse::<IpAddr>().is_err() && entry.parse::<IpNet>().is_err() {
                anyhow::bail!("Invalid allowlist entry: {}", entry);
            }
        }

        Ok(())
    }

    /// Parse allowlist entries into IpAddr or IpNet.
    pub fn parse_allowlist(&self) -> Vec<AllowlistEntry> {
        self.allowlist
            .iter()
            .filter_map(|s| {
                if let Ok(ip) = s.parse::<IpAddr>() {
                    Some(AllowlistEntry::Single(ip))
                } else if let Ok(net) = s.parse::<IpNet>() {
                    Some(AllowlistEntry::Network(net))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# Sentinel Gatekeeper Configuration

gatekeeper:
  enabled: true
  timeout_seconds: 10          # Time limit for all checks of one connection

  filters:
    link: true                 # Reject names containing links or invites

    # Address classification: none, reputation or static
    address:
      mode: static
      providers: []            # Empty = all of:
                               #   x4bnet-datacenter, x4bnet-vpn, azure,
                               #   github-actions, amazon-web-services,
                               #   google, oracle
      fetch_timeout_seconds: 10

    # address:
    #   mode: reputation
    #   token: "${VPNAPI_TOKEN}"   # Use environment variable
    #   cache_ttl_seconds: 3600    # Forget unused verdicts after 1 hour
    #   timeout_ms: 5000

# Addresses never checked by the address blocker
# Supports single IPs and CIDR notation
allowlist:
  - "203.0.113.7"
  - "198.51.100.0/24"
"#
        .to_string()
    }
}

/// Parsed allowlist entry.
#[derive(Debug, Clone)]
pub enum AllowlistEntry {
    Single(IpAddr),
    Network(IpNet),
}

impl AllowlistEntry {
    /// Check if an IP address matches this allowlist entry.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        let ip = ip.to_canonical();
        match self {
            AllowlistEntry::Single(allowed) => *allowed == ip,
            AllowlistEntry::Network(net) => net.contains(&ip),
        }
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> anyhow::Result<String> {
    let mut result = content.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}")?;

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let var_value = std::env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    Ok(result)
}
