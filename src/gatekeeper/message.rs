//! Player-facing rejection messages.

use std::fmt;

pub const ADDRESS_BLOCKED: &str = "gatekeeper.address-blocker.failure";
pub const LINK_DETECTED: &str = "gatekeeper.link-detection.failure";
pub const TIMEOUT: &str = "gatekeeper.timeout";
pub const INVALID_ADDRESS: &str = "gatekeeper.invalid-address";

/// A rejection reason, rendered per locale by whoever shows it to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Catalog key with positional arguments (`{0}`, `{1}`, ...).
    Translatable { key: String, args: Vec<String> },
    /// Literal text, shown as is.
    Text(String),
}

impl Message {
    pub fn translatable(key: impl Into<String>, args: Vec<String>) -> Self {
        Message::Translatable {
            key: key.into(),
            args,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Message::Text(text.into())
    }

    /// Render for a locale tag such as `en-US`.
    ///
    /// Unknown locales fall back to English; unknown keys render as the key.
    pub fn render(&self, locale: &str) -> String {
        match self {
            Message::Text(text) => text.clone(),
            Message::Translatable { key, args } => {
                let language = locale.split(['-', '_']).next().unwrap_or_default();
                let template = template(language, key)
                    .or_else(|| template("en", key))
                    .unwrap_or(key.as_str());
                substitute(template, args)
            }
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render("en"))
    }
}

fn template(language: &str, key: &str) -> Option<&'static str> {
    match (language, key) {
        ("en", ADDRESS_BLOCKED) => Some(
            "Your address {0} belongs to a VPN, proxy or hosting provider. Disable it and reconnect.",
        ),
        ("en", LINK_DETECTED) => Some("Your name must not contain links or invites."),
        ("en", TIMEOUT) => Some("The server took too long to check your connection. Please try again."),
        ("en", INVALID_ADDRESS) => Some("Your connection address {0} could not be verified."),
        _ => None,
    }
}

fn substitute(template: &str, args: &[String]) -> String {
    args.iter()
        .enumerate()
        .fold(template.to_string(), |text, (i, arg)| text.replace(&format!("{{{}}}", i), arg))
}
