use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Whether an announcement marks a stream going live or ending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Start,
    End,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Start => f.write_str("start"),
            Direction::End => f.write_str("end"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" | "live" | "online" => Ok(Direction::Start),
            "end" | "offline" | "stop" => Ok(Direction::End),
            other => Err(format!("unknown direction `{other}`")),
        }
    }
}

/// A social network receiving announcements.
///
/// Names that are not recognised are kept as [`Network::Other`]; they get
/// a generic character budget and skip network specific formatting rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Network {
    Bluesky,
    Mastodon,
    Discord,
    Matrix,
    Other(String),
}

impl Network {
    pub fn name(&self) -> &str {
        match self {
            Network::Bluesky => "bluesky",
            Network::Mastodon => "mastodon",
            Network::Discord => "discord",
            Network::Matrix => "matrix",
            Network::Other(name) => name,
        }
    }

    /// Chat networks render markdown and support mass pings.
    pub fn is_chat_style(&self) -> bool {
        matches!(self, Network::Discord | Network::Matrix)
    }

    /// Feed networks that build a link card from the appended URL and
    /// resolve handle mentions.
    pub fn is_link_card(&self) -> bool {
        matches!(self, Network::Bluesky | Network::Mastodon)
    }

    /// Networks that show markup and HTML entities exactly as typed.
    pub fn renders_literal_text(&self) -> bool {
        matches!(self, Network::Bluesky | Network::Mastodon)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for Network {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "bluesky" | "bsky" => Network::Bluesky,
            "mastodon" => Network::Mastodon,
            "discord" => Network::Discord,
            "matrix" => Network::Matrix,
            other => Network::Other(other.to_string()),
        }
    }
}

impl From<String> for Network {
    fn from(value: String) -> Self {
        Network::from(value.as_str())
    }
}

impl From<Network> for String {
    fn from(value: Network) -> Self {
        value.name().to_string()
    }
}

impl FromStr for Network {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Network::from(s))
    }
}

/// The facts of one stream transition for one target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub direction: Direction,
    pub platform_name: String,
    pub username: String,
    pub title: String,
    pub url: Option<String>,
    pub network: Network,
    #[serde(default)]
    pub is_thinking_model: bool,
}

impl GenerationRequest {
    pub fn new(
        direction: Direction,
        platform_name: impl Into<String>,
        username: impl Into<String>,
        title: impl Into<String>,
        network: impl Into<Network>,
    ) -> Self {
        GenerationRequest {
            direction,
            platform_name: platform_name.into(),
            username: username.into(),
            title: title.into(),
            url: None,
            network: network.into(),
            is_thinking_model: false,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn thinking_model(mut self, is_thinking_model: bool) -> Self {
        self.is_thinking_model = is_thinking_model;
        self
    }
}
