//! Rejects players whose name advertises a link or invite.

use super::message::{self, Message};
use super::{GatekeeperContext, GatekeeperResult};
use crate::pipeline::Processor;
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;

pub const LINK_DETECTED_COOLDOWN: Duration = Duration::from_secs(10);

/// Matched case-insensitively, so `HTTPS://` and `Discord.GG` count too.
const LINK_PATTERN: &str = r"(?i)https?://|discord\.gg";

/// Color tags such as `[red]`, `[#ff0000]` or the reset tag `[]`.
const MARKUP_PATTERN: &str = r"\[(?:#[0-9a-fA-F]{3,8}|[a-zA-Z]*)\]";

/// Link detection processor.
pub struct LinkDetectionProcessor {
    link: Regex,
    markup: Regex,
}

impl LinkDetectionProcessor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            link: Regex::new(LINK_PATTERN)?,
            markup: Regex::new(MARKUP_PATTERN)?,
        })
    }

    /// Remove color markup from a display name.
    pub fn strip_markup(&self, name: &str) -> String {
        self.markup.replace_all(name, "").into_owned()
    }

    pub fn contains_link(&self, name: &str) -> bool {
        self.link.is_match(&self.strip_markup(name))
    }

    /// Verdict for a display name.
    pub fn check(&self, name: &str) -> GatekeeperResult {
        if self.contains_link(name) {
            GatekeeperResult::failure(
                Message::translatable(message::LINK_DETECTED, Vec::new()),
                LINK_DETECTED_COOLDOWN,
            )
        } else {
            GatekeeperResult::Success
        }
    }
}

#[async_trait]
impl Processor<GatekeeperContext, GatekeeperResult> for LinkDetectionProcessor {
    async fn process(&self, context: &GatekeeperContext) -> anyhow::Result<GatekeeperResult> {
        Ok(self.check(&context.name))
    }
}
