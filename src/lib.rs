//! Connection gatekeeper for multiplayer game servers.
//!
//! Decides whether an incoming connection may join by running it through a
//! priority-ordered chain of checks.
//!
//! # Features
//!
//! - **Processor Pipeline** - Generic async chain that stops at the first rejection
//!   and isolates misbehaving checks
//! - **Link Detection** - Reject display names advertising URLs or invites
//! - **Static Blocklists** - Cloud, datacenter and VPN ranges fetched from
//!   published provider lists at startup
//! - **Reputation Lookups** - Query a VPN detection API with a cached verdict
//! - **Allowlist** - Explicitly trusted addresses and networks
//!
//! # Example Configuration
//!
//! ```yaml
//! gatekeeper:
//!   enabled: true
//!   timeout_seconds: 10
//!   filters:
//!     link: true
//!     address:
//!       mode: reputation
//!       token: "${VPNAPI_TOKEN}"
//!       cache_ttl_seconds: 3600
//!
//! allowlist:
//!   - "203.0.113.7"
//!   - "198.51.100.0/24"
//! ```

pub mod blocker;
pub mod cache;
pub mod config;
pub mod gatekeeper;
pub mod intercept;
pub mod pipeline;
pub mod providers;
pub mod range;

pub use config::Config;
pub use gatekeeper::{build_pipeline, GatekeeperContext, GatekeeperPipeline, GatekeeperResult};
pub use intercept::{Admission, ConnectionInterceptor, Handshake};
pub use pipeline::{Priority, Processor, ProcessorPipeline};
pub use range::{AddressRange, RangeSet};
