//! # Guardrail configuration
//!
//! Process-wide settings for generation, retries and the post-generation
//! guardrails. Loaded once at startup and shared read-only afterwards.
//!
//! Every field has a default, so a JSON file only needs to list the values
//! it overrides:
//!
//! ```json
//! { "max_retries": 5, "profanity_severity": "severe",
//!   "character_limits": { "mastodon": 1000 } }
//! ```

use std::{collections::HashMap, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    types::{Direction, Network},
    Error,
};

/// Which profanity tiers count as a violation.
///
/// Checking at a tier flags words from that tier and every milder one, so
/// `Severe` is the most thorough setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfanitySeverity {
    Mild,
    #[default]
    Moderate,
    Severe,
}

/// What the pipeline does with a candidate carrying reject-class issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectPolicy {
    /// Ask the backend again, up to `extra_attempts` more times.
    Regenerate { extra_attempts: u32 },
    /// Give up immediately so the caller posts its template message.
    Fallback,
}

impl Default for RejectPolicy {
    fn default() -> Self {
        RejectPolicy::Regenerate { extra_attempts: 1 }
    }
}

/// Expected hashtag counts for one network, per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagCounts {
    pub start: usize,
    pub end: usize,
}

impl HashtagCounts {
    pub fn for_direction(&self, direction: Direction) -> usize {
        match direction {
            Direction::Start => self.start,
            Direction::End => self.end,
        }
    }
}

impl Default for HashtagCounts {
    fn default() -> Self {
        HashtagCounts { start: 3, end: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    pub max_retries: u32,
    /// Base of the exponential backoff, in seconds.
    pub retry_delay_base: f64,
    pub max_concurrent_calls: usize,
    pub min_delay_seconds: f64,
    /// Deadline for a single backend call. Exceeding it counts as a
    /// retryable timeout.
    pub attempt_timeout_seconds: Option<f64>,
    pub hashtags: HashtagCounts,
    /// Per-network overrides of `hashtags`, keyed by network name.
    pub network_hashtags: HashMap<String, HashtagCounts>,
    pub max_emoji_count: usize,
    pub profanity_severity: ProfanitySeverity,
    pub dedup_cache_size: usize,
    /// Scores below this reject the candidate. `0` keeps the scorer advisory.
    pub min_quality_score: u8,
    /// Per-network overrides of the hard character limit.
    pub character_limits: HashMap<String, usize>,
    /// Per-network `[min, max]` length the quality scorer expects.
    pub length_windows: HashMap<String, (usize, usize)>,
    pub reject_policy: RejectPolicy,
    /// Emit candidates whose only issues are advisory (hallucinated facts,
    /// formatting) with a logged warning instead of rejecting them.
    pub emit_on_advisory: bool,
    pub vocabulary: Vocabulary,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        GuardrailConfig {
            max_retries: 3,
            retry_delay_base: 2.0,
            max_concurrent_calls: 4,
            min_delay_seconds: 2.0,
            attempt_timeout_seconds: None,
            hashtags: HashtagCounts::default(),
            network_hashtags: HashMap::new(),
            max_emoji_count: 3,
            profanity_severity: ProfanitySeverity::default(),
            dedup_cache_size: 50,
            min_quality_score: 0,
            character_limits: HashMap::new(),
            length_windows: HashMap::new(),
            reject_policy: RejectPolicy::default(),
            emit_on_advisory: false,
            vocabulary: Vocabulary::default(),
        }
    }
}

impl GuardrailConfig {
    /// Reads a JSON config file and checks it for nonsensical values.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str::<GuardrailConfig>(&raw)?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded guardrail config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_concurrent_calls == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrent_calls must be at least 1".into(),
            ));
        }
        if !self.retry_delay_base.is_finite() || self.retry_delay_base <= 0.0 {
            return Err(Error::InvalidConfig(
                "retry_delay_base must be a positive number of seconds".into(),
            ));
        }
        if Duration::try_from_secs_f64(self.min_delay_seconds).is_err() {
            return Err(Error::InvalidConfig(
                "min_delay_seconds must be a non-negative, representable duration".into(),
            ));
        }
        if let Some(timeout) = self.attempt_timeout_seconds {
            if timeout <= 0.0 || Duration::try_from_secs_f64(timeout).is_err() {
                return Err(Error::InvalidConfig(
                    "attempt_timeout_seconds must be a positive, representable duration".into(),
                ));
            }
        }
        if let Some((name, _)) = self.length_windows.iter().find(|(_, (min, max))| min > max) {
            return Err(Error::InvalidConfig(format!(
                "length_windows.{name}: min is larger than max"
            )));
        }
        if self.min_quality_score > 10 {
            return Err(Error::InvalidConfig(
                "min_quality_score must be within 0..=10".into(),
            ));
        }
        Ok(())
    }

    pub fn expected_hashtags(&self, direction: Direction, network: &Network) -> usize {
        self.network_hashtags
            .get(network.name())
            .unwrap_or(&self.hashtags)
            .for_direction(direction)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.min_delay_seconds).unwrap_or_default()
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_seconds
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

/// A phrase the backend must not invent on its own, as a regex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactPattern {
    pub label: String,
    pub pattern: String,
}

impl FactPattern {
    fn new(label: &str, pattern: &str) -> Self {
        FactPattern {
            label: label.into(),
            pattern: pattern.into(),
        }
    }
}

/// Word lists per profanity tier. Each word belongs to exactly one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfanityTiers {
    pub mild: Vec<String>,
    pub moderate: Vec<String>,
    pub severe: Vec<String>,
}

impl Default for ProfanityTiers {
    fn default() -> Self {
        ProfanityTiers {
            mild: words(&["damn", "dammit", "hell", "crap", "crappy", "sucks", "bloody"]),
            moderate: words(&["ass", "asshole", "bastard", "bitch", "piss", "pissed", "shit", "bullshit"]),
            severe: words(&["fuck", "fucking", "fucked", "motherfucker", "cunt"]),
        }
    }
}

/// The fixed vocabularies the guardrails match against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Clickbait and hype words, matched as whole words.
    pub forbidden_words: Vec<String>,
    pub hallucination_patterns: Vec<FactPattern>,
    pub profanity: ProfanityTiers,
    /// Generic filler the quality scorer penalises.
    pub filler_phrases: Vec<String>,
    /// Words ignored when matching the stream title against the message.
    pub stopwords: Vec<String>,
    /// Substrings (case-insensitive) marking a backend error as transient.
    pub retryable_keywords: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Vocabulary {
            forbidden_words: words(&[
                "insane",
                "epic",
                "crazy",
                "smash",
                "incredible",
                "legendary",
                "lit",
                "amazing",
                "fire",
                "unbelievable",
                "mind-blowing",
                "banger",
                "goated",
                "unmissable",
                "must-see",
                "jaw-dropping",
            ]),
            hallucination_patterns: vec![
                FactPattern::new(
                    "viewer count",
                    r"\b\d[\d,.]*k?\s*(?:viewers|watchers|followers|subs|subscribers|people watching)\b",
                ),
                FactPattern::new("drops", r"\bdrops?\s+(?:are\s+|is\s+)?(?:enabled|active|live|on)\b"),
                FactPattern::new("giveaway", r"\bgive-?aways?\b"),
                FactPattern::new("clock time", r"\b\d{1,2}(?::\d{2})?\s?(?:am|pm)\b|\b\d{1,2}:\d{2}\b"),
                FactPattern::new("raid", r"\braid(?:ed|ing|s)?\b"),
                FactPattern::new(
                    "vod",
                    r"\bvods?\s+(?:coming|will be|is up|are up|soon|available|drops)\b",
                ),
                FactPattern::new("special guest", r"\bspecial\s+guests?\b"),
            ],
            profanity: ProfanityTiers::default(),
            filler_phrases: words(&[
                "come hang out",
                "let's go",
                "lets go",
                "thanks for watching",
                "see you next time",
                "don't miss",
                "join me",
                "tune in",
                "come through",
                "hope to see you",
                "be there",
            ]),
            stopwords: words(&[
                "the", "a", "an", "and", "or", "but", "of", "to", "in", "on", "at", "for", "with",
                "by", "from", "is", "it", "its", "this", "that", "my", "our", "your", "some", "more",
                "vs", "via", "day", "part", "stream", "live", "new",
            ]),
            retryable_keywords: words(&[
                "unavailable",
                "rate limit",
                "rate_limit",
                "ratelimit",
                "too many requests",
                "429",
                "quota",
                "resource_exhausted",
                "exhausted",
                "overloaded",
                "overload",
                "503",
                "timeout",
                "timed out",
                "deadline",
            ]),
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: GuardrailConfig = serde_json::from_str(
            r#"{
                "max_retries": 5,
                "profanity_severity": "severe",
                "character_limits": { "mastodon": 1000 },
                "reject_policy": { "kind": "fallback" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.profanity_severity, ProfanitySeverity::Severe);
        assert_eq!(config.character_limits.get("mastodon"), Some(&1000));
        assert_eq!(config.reject_policy, RejectPolicy::Fallback);
        assert_eq!(config.max_concurrent_calls, 4);
        assert_eq!(config.dedup_cache_size, 50);
        assert!(config.vocabulary.forbidden_words.contains(&"epic".to_string()));
    }

    #[test]
    fn network_hashtag_override_wins() {
        let mut config = GuardrailConfig::default();
        config
            .network_hashtags
            .insert("discord".into(), HashtagCounts { start: 1, end: 0 });

        assert_eq!(config.expected_hashtags(Direction::Start, &Network::Discord), 1);
        assert_eq!(config.expected_hashtags(Direction::End, &Network::Discord), 0);
        assert_eq!(config.expected_hashtags(Direction::Start, &Network::Bluesky), 3);
        assert_eq!(config.expected_hashtags(Direction::End, &Network::Bluesky), 2);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = GuardrailConfig {
            max_concurrent_calls: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn unrepresentable_durations_are_rejected() {
        let config = GuardrailConfig {
            attempt_timeout_seconds: Some(1e30),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        assert_eq!(config.attempt_timeout(), None);

        let config = GuardrailConfig {
            min_delay_seconds: 1e30,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        assert_eq!(config.min_delay(), Duration::ZERO);

        let config = GuardrailConfig {
            min_delay_seconds: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_length_window_is_rejected() {
        let config: GuardrailConfig =
            serde_json::from_str(r#"{ "length_windows": { "discord": [500, 40] } }"#).unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn severity_orders_from_mild_to_severe() {
        assert!(ProfanitySeverity::Mild < ProfanitySeverity::Moderate);
        assert!(ProfanitySeverity::Moderate < ProfanitySeverity::Severe);
    }
}
