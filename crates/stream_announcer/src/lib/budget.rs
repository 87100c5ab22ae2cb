//! # Budget allocation
//!
//! How many characters of generated content fit into a post on a given
//! network, once room for the appended stream link is reserved.

use crate::{
    config::GuardrailConfig,
    types::{Direction, Network},
};

/// Characters between the content and the appended link.
pub const LINK_SEPARATOR: &str = "\n\n";

/// Smallest budget ever handed to the backend.
pub const MIN_CONTENT_LENGTH: usize = 50;

/// Conservative cap for the strictest network, so that content, separator
/// and a plausible link stay under its limit even when the backend ignores
/// the requested length.
pub const STRICT_NETWORK_CONTENT_CAP: usize = 240;

/// Room kept free in end-of-stream messages for hashtags the backend adds.
pub const END_MESSAGE_HEADROOM: usize = 20;

impl Network {
    /// Hard character limit of a post, before config overrides.
    pub fn default_char_limit(&self) -> usize {
        match self {
            Network::Bluesky => 300,
            Network::Mastodon => 500,
            Network::Discord => 2000,
            Network::Matrix => 4000,
            Network::Other(_) => 500,
        }
    }

    /// Length window (in characters) a well-sized announcement falls into
    /// at the default character limit.
    pub fn preferred_length(&self) -> (usize, usize) {
        match self {
            Network::Bluesky => (60, 280),
            Network::Mastodon => (60, 450),
            Network::Discord | Network::Matrix => (40, 500),
            Network::Other(_) => (40, 450),
        }
    }

    fn is_strictest(&self) -> bool {
        matches!(self, Network::Bluesky)
    }
}

impl GuardrailConfig {
    pub fn char_limit(&self, network: &Network) -> usize {
        self.character_limits
            .get(network.name())
            .copied()
            .unwrap_or_else(|| network.default_char_limit())
    }

    /// Length window the quality scorer expects on `network`. Without a
    /// configured window the default one is used, keeping its headroom
    /// under a configured character limit.
    pub fn length_window(&self, network: &Network) -> (usize, usize) {
        if let Some(window) = self.length_windows.get(network.name()) {
            return *window;
        }
        let (min, max) = network.preferred_length();
        let headroom = network.default_char_limit().saturating_sub(max);
        let max = self.char_limit(network).saturating_sub(headroom).max(min);
        (min, max)
    }
}

/// Maximum generated content length for `network`, excluding the link.
///
/// Start messages reserve `len(url) + 2` for the separator and link. End
/// messages carry no link but keep [`END_MESSAGE_HEADROOM`] free. The
/// result is never below [`MIN_CONTENT_LENGTH`].
pub fn content_max(
    config: &GuardrailConfig,
    network: &Network,
    direction: Direction,
    url: Option<&str>,
) -> usize {
    let hard_limit = config.char_limit(network);

    let budget = match direction {
        Direction::Start => {
            let reserved = url
                .map(|u| u.chars().count() + LINK_SEPARATOR.chars().count())
                .unwrap_or(0);
            let available = hard_limit.saturating_sub(reserved);
            if network.is_strictest() {
                available.min(STRICT_NETWORK_CONTENT_CAP)
            } else {
                available
            }
        }
        Direction::End => hard_limit.saturating_sub(END_MESSAGE_HEADROOM),
    };

    budget.max(MIN_CONTENT_LENGTH)
}

/// Joins generated content and the stream link into the final post.
pub fn append_link(content: &str, url: Option<&str>) -> String {
    match url {
        Some(url) if !url.trim().is_empty() => {
            format!("{}{LINK_SEPARATOR}{}", content.trim_end(), url.trim())
        }
        _ => content.trim_end().to_string(),
    }
}
