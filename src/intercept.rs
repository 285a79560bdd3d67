//! Connection intercept adapter.
//!
//! Turns a raw connection handshake into a [`GatekeeperContext`], runs the
//! admission pipeline under an end-to-end timeout and reports whether the
//! handshake may continue. Installing the adapter into the host server is
//! host-specific glue and lives outside this crate.

use crate::gatekeeper::message::{self, Message};
use crate::gatekeeper::{GatekeeperContext, GatekeeperPipeline, GatekeeperResult, PlayerId};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_LOCALE: &str = "en";

/// Raw handshake data as received from the host server.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub name: String,
    pub uuid: String,
    pub usid: String,
    pub address: String,
    pub locale: Option<String>,
}

/// What the host should do with the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Hand the handshake back to the host's regular handler.
    Proceed,
    /// Close the connection with a rendered message. A zero cooldown means
    /// the player may retry immediately.
    Reject { message: String, cooldown: Duration },
}

/// Runs every incoming handshake through the admission pipeline.
#[derive(Clone)]
pub struct ConnectionInterceptor {
    pipeline: Arc<GatekeeperPipeline>,
    timeout: Duration,
}

impl ConnectionInterceptor {
    pub fn new(pipeline: Arc<GatekeeperPipeline>, timeout: Duration) -> Self {
        Self { pipeline, timeout }
    }

    /// Decide whether a handshake may proceed.
    pub async fn admit(&self, handshake: Handshake) -> Admission {
        let locale = normalize_locale(handshake.locale.as_deref());

        let address: IpAddr = match handshake.address.trim().parse() {
            Ok(address) => address,
            Err(_) => {
                warn!(
                    name = %handshake.name,
                    address = %handshake.address,
                    "Rejecting handshake with unparseable address"
                );
                let reason = Message::translatable(message::INVALID_ADDRESS, vec![handshake.address]);
                return Admission::Reject {
                    message: reason.render(&locale),
                    cooldown: Duration::ZERO,
                };
            }
        };

        let context = GatekeeperContext {
            name: handshake.name,
            player: PlayerId::new(handshake.uuid, handshake.usid),
            address,
            locale,
        };

        match tokio::time::timeout(self.timeout, self.pipeline.pump(&context)).await {
            Ok(GatekeeperResult::Success) => {
                debug!(context = %context, "Connection admitted");
                Admission::Proceed
            }
            Ok(GatekeeperResult::Failure { reason, cooldown }) => {
                let message = reason.render(&context.locale);
                info!(
                    context = %context,
                    reason = %message,
                    cooldown_secs = cooldown.as_secs(),
                    "Connection rejected"
                );
                Admission::Reject { message, cooldown }
            }
            Err(_) => {
                warn!(
                    context = %context,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Timed out while processing connection"
                );
                Admission::Reject {
                    message: Message::translatable(message::TIMEOUT, Vec::new()).render(&context.locale),
                    cooldown: Duration::ZERO,
                }
            }
        }
    }
}

/// `en_US` becomes `en-US`; a missing or blank tag becomes `en`.
pub fn normalize_locale(locale: Option<&str>) -> String {
    match locale.map(str::trim) {
        Some(tag) if !tag.is_empty() => tag.replace('_', "-"),
        _ => DEFAULT_LOCALE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatekeeper::{LinkDetectionProcessor, LINK_DETECTED_COOLDOWN};
    use crate::pipeline::{Priority, Processor};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Processor that never finishes.
    struct Hanging;

    #[async_trait]
    impl Processor<GatekeeperContext, GatekeeperResult> for Hanging {
        async fn process(&self, _context: &GatekeeperContext) -> anyhow::Result<GatekeeperResult> {
            futures::future::pending().await
        }
    }

    /// Records the contexts it sees.
    struct Capture(Arc<Mutex<Vec<GatekeeperContext>>>);

    #[async_trait]
    impl Processor<GatekeeperContext, GatekeeperResult> for Capture {
        async fn process(&self, context: &GatekeeperContext) -> anyhow::Result<GatekeeperResult> {
            self.0.lock().unwrap().push(context.clone());
            Ok(GatekeeperResult::Success)
        }
    }

    fn handshake(name: &str, address: &str) -> Handshake {
        Handshake {
            name: name.to_string(),
            uuid: "uuid".to_string(),
            usid: "usid".to_string(),
            address: address.to_string(),
            locale: None,
        }
    }

    fn interceptor(pipeline: GatekeeperPipeline, timeout: Duration) -> ConnectionInterceptor {
        ConnectionInterceptor::new(Arc::new(pipeline), timeout)
    }

    #[tokio::test]
    async fn test_success_proceeds() {
        let interceptor = interceptor(GatekeeperPipeline::new(), Duration::from_secs(1));
        assert_eq!(interceptor.admit(handshake("Player", "1.2.3.4")).await, Admission::Proceed);
    }

    #[tokio::test]
    async fn test_failure_rejects_with_rendered_reason() {
        let mut pipeline = GatekeeperPipeline::new();
        pipeline.register("link", Priority::Normal, LinkDetectionProcessor::new().unwrap());

        let admission = interceptor(pipeline, Duration::from_secs(1))
            .admit(handshake("http://spam.example", "1.2.3.4"))
            .await;

        assert_eq!(
            admission,
            Admission::Reject {
                message: Message::translatable(message::LINK_DETECTED, Vec::new()).render("en"),
                cooldown: LINK_DETECTED_COOLDOWN,
            }
        );
    }

    #[tokio::test]
    async fn test_timeout_rejects_without_cooldown() {
        let mut pipeline = GatekeeperPipeline::new();
        pipeline.register("hanging", Priority::Normal, Hanging);

        let admission = interceptor(pipeline, Duration::from_millis(50))
            .admit(handshake("Player", "1.2.3.4"))
            .await;

        assert_eq!(
            admission,
            Admission::Reject {
                message: Message::translatable(message::TIMEOUT, Vec::new()).render("en"),
                cooldown: Duration::ZERO,
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_address_rejects_without_cooldown() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = GatekeeperPipeline::new();
        pipeline.register("capture", Priority::Normal, Capture(seen.clone()));

        let admission = interceptor(pipeline, Duration::from_secs(1))
            .admit(handshake("Player", "not-an-address"))
            .await;

        match admission {
            Admission::Reject { message, cooldown } => {
                assert!(message.contains("not-an-address"));
                assert_eq!(cooldown, Duration::ZERO);
            }
            Admission::Proceed => panic!("invalid address was admitted"),
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_context_is_built_from_handshake() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = GatekeeperPipeline::new();
        pipeline.register("capture", Priority::Normal, Capture(seen.clone()));

        let mut raw = handshake("Player", " 2001:db8::1 ");
        raw.locale = Some("pt_BR".to_string());
        interceptor(pipeline, Duration::from_secs(1)).admit(raw).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].address, "2001:db8::1".parse::<IpAddr>().unwrap());
        assert_eq!(seen[0].locale, "pt-BR");
        assert_eq!(seen[0].player, PlayerId::new("uuid", "usid"));
    }

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale(None), "en");
        assert_eq!(normalize_locale(Some("  ")), "en");
        assert_eq!(normalize_locale(Some("de_DE")), "de-DE");
        assert_eq!(normalize_locale(Some("fr")), "fr");
    }
}
