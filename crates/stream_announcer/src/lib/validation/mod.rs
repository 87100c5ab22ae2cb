//! # Validation pipeline
//!
//! Deterministic checks and repairs applied to backend output before it
//! may be posted. Repairs (username hashtag stripping, truncation) run
//! first because they change what the checks see; the checks then only
//! report.
//!
//! Issues come in three classes:
//! - [`IssueClass::Repaired`]: already fixed in the candidate text.
//! - [`IssueClass::Advisory`]: posting is possible, with a logged warning,
//!   when the caller allows it.
//! - [`IssueClass::Fatal`]: the text must not be posted as is.

pub mod format;
pub mod hashtags;
pub mod wordlists;

use std::{fmt, sync::Arc};

use crate::{
    config::GuardrailConfig,
    scorer::QualityScorer,
    types::GenerationRequest,
    Error,
};

use self::wordlists::{FactDetector, ForbiddenWords, ProfanityFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    HashtagCount,
    UsernameHashtag,
    Truncated,
    Empty,
    ForbiddenWord,
    BareUrl,
    HallucinatedFact,
    Profanity,
    EmojiCount,
    Formatting,
    Duplicate,
    LowQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueClass {
    Repaired,
    Advisory,
    Fatal,
}

impl IssueKind {
    pub fn class(self) -> IssueClass {
        match self {
            IssueKind::UsernameHashtag | IssueKind::Truncated => IssueClass::Repaired,
            IssueKind::HallucinatedFact | IssueKind::Formatting => IssueClass::Advisory,
            IssueKind::HashtagCount
            | IssueKind::Empty
            | IssueKind::ForbiddenWord
            | IssueKind::BareUrl
            | IssueKind::Profanity
            | IssueKind::EmojiCount
            | IssueKind::Duplicate
            | IssueKind::LowQuality => IssueClass::Fatal,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueKind::HashtagCount => "hashtag count",
            IssueKind::UsernameHashtag => "username hashtag",
            IssueKind::Truncated => "truncated",
            IssueKind::Empty => "empty",
            IssueKind::ForbiddenWord => "forbidden words",
            IssueKind::BareUrl => "bare url",
            IssueKind::HallucinatedFact => "hallucinated fact",
            IssueKind::Profanity => "profanity",
            IssueKind::EmojiCount => "emoji count",
            IssueKind::Formatting => "formatting",
            IssueKind::Duplicate => "duplicate",
            IssueKind::LowQuality => "low quality",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub detail: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, detail: impl Into<String>) -> Self {
        ValidationIssue {
            kind,
            detail: detail.into(),
        }
    }

    pub fn class(&self) -> IssueClass {
        self.kind.class()
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// A generated text together with everything the guardrails found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Text after repairs; this is what gets posted.
    pub text: String,
    pub hashtag_count: usize,
    pub issues: Vec<ValidationIssue>,
    pub score: u8,
    pub score_issues: Vec<String>,
}

impl Candidate {
    fn issues_of(&self, class: IssueClass) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.class() == class)
    }

    pub fn fatal_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues_of(IssueClass::Fatal)
    }

    pub fn advisory_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues_of(IssueClass::Advisory)
    }

    pub fn has_fatal(&self) -> bool {
        self.fatal_issues().next().is_some()
    }

    pub fn has_advisory(&self) -> bool {
        self.advisory_issues().next().is_some()
    }

    /// No reject-class issues at all. Repairs do not count.
    pub fn is_clean(&self) -> bool {
        !self.has_fatal() && !self.has_advisory()
    }

    pub fn is_emittable(&self, emit_on_advisory: bool) -> bool {
        if emit_on_advisory {
            !self.has_fatal()
        } else {
            self.is_clean()
        }
    }

    pub fn push_issue(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

/// Runs the full battery of checks. Holds the compiled vocabularies, so
/// build it once and share it.
#[derive(Debug, Clone)]
pub struct Validator {
    config: Arc<GuardrailConfig>,
    forbidden: ForbiddenWords,
    profanity: ProfanityFilter,
    facts: FactDetector,
    scorer: QualityScorer,
}

impl Validator {
    pub fn new(config: Arc<GuardrailConfig>) -> Result<Self, Error> {
        let vocabulary = &config.vocabulary;
        Ok(Validator {
            forbidden: ForbiddenWords::new(&vocabulary.forbidden_words)?,
            profanity: ProfanityFilter::new(&vocabulary.profanity)?,
            facts: FactDetector::new(&vocabulary.hallucination_patterns)?,
            scorer: QualityScorer::new(vocabulary),
            config,
        })
    }

    /// Repairs and checks `text` for `request`, with `content_max` the
    /// character budget from the allocator.
    pub fn validate(&self, text: &str, request: &GenerationRequest, content_max: usize) -> Candidate {
        let mut issues = Vec::new();

        let (text, stripped) = hashtags::strip_username_hashtags(text.trim(), &request.username);
        if !stripped.is_empty() {
            issues.push(ValidationIssue::new(IssueKind::UsernameHashtag, stripped.join(", ")));
        }

        let text = match format::truncate_to_budget(&text, content_max) {
            Some(shortened) => {
                issues.push(ValidationIssue::new(
                    IssueKind::Truncated,
                    format!("shortened from {} to {} characters", text.chars().count(), shortened.chars().count()),
                ));
                shortened
            }
            None => text,
        };

        if text.trim().is_empty() {
            issues.push(ValidationIssue::new(IssueKind::Empty, "no content left"));
            return Candidate {
                text,
                hashtag_count: 0,
                issues,
                score: 0,
                score_issues: vec!["empty".to_string()],
            };
        }

        let expected = self.config.expected_hashtags(request.direction, &request.network);
        issues.extend(hashtags::check_count(&text, expected));
        issues.extend(self.forbidden.check(&text));
        issues.extend(format::check_bare_urls(&text));
        issues.extend(self.facts.check(&text, &request.title));
        issues.extend(self.profanity.check(&text, self.config.profanity_severity));
        issues.extend(format::check_emoji(&text, self.config.max_emoji_count));
        issues.extend(format::check_network_formatting(&text, &request.network));

        let (score, score_issues) =
            self.scorer
                .score(&text, &request.title, self.config.length_window(&request.network));

        Candidate {
            hashtag_count: hashtags::count(&text),
            text,
            issues,
            score,
            score_issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Network};

    fn validator() -> Validator {
        Validator::new(Arc::new(GuardrailConfig::default())).unwrap()
    }

    fn request(network: Network) -> GenerationRequest {
        GenerationRequest::new(
            Direction::Start,
            "Twitch",
            "ChiefGyk3D",
            "Building a castle in creative mode",
            network,
        )
        .with_url("https://twitch.tv/chiefgyk3d")
    }

    #[test]
    fn clean_text_passes_unchanged() {
        let text = "Building a castle in creative mode tonight, come help with the towers #Minecraft #Building #Creative";
        let candidate = validator().validate(text, &request(Network::Mastodon), 450);

        assert_eq!(candidate.text, text);
        assert_eq!(candidate.hashtag_count, 3);
        assert!(candidate.issues.is_empty(), "{:?}", candidate.issues);
        assert!(candidate.is_clean());
    }

    #[test]
    fn username_stripping_runs_before_count_check() {
        let text = "Building a castle in creative mode tonight #Chief #Minecraft #Building #Creative";
        let candidate = validator().validate(text, &request(Network::Mastodon), 450);

        assert_eq!(
            candidate.text,
            "Building a castle in creative mode tonight #Minecraft #Building #Creative"
        );
        assert_eq!(candidate.hashtag_count, 3);
        assert!(!candidate.has_fatal());
        assert_eq!(candidate.issues[0].kind, IssueKind::UsernameHashtag);
        assert!(candidate.is_emittable(false));
    }

    #[test]
    fn every_fatal_check_reports() {
        let text = "EPIC castle build, shit is about to get real https://example.com 🎮🎮🎮🎮 #Minecraft";
        let candidate = validator().validate(text, &request(Network::Mastodon), 450);
        let kinds = candidate.fatal_issues().map(|i| i.kind).collect::<Vec<_>>();

        assert!(kinds.contains(&IssueKind::HashtagCount));
        assert!(kinds.contains(&IssueKind::ForbiddenWord));
        assert!(kinds.contains(&IssueKind::BareUrl));
        assert!(kinds.contains(&IssueKind::Profanity));
        assert!(kinds.contains(&IssueKind::EmojiCount));
        assert!(!candidate.is_emittable(true));
    }

    #[test]
    fn advisory_issues_depend_on_policy() {
        let text = "Building a castle with a special guest tonight #Minecraft #Building #Creative";
        let candidate = validator().validate(text, &request(Network::Mastodon), 450);

        assert!(!candidate.has_fatal());
        assert!(candidate.has_advisory());
        assert!(!candidate.is_emittable(false));
        assert!(candidate.is_emittable(true));
    }

    #[test]
    fn long_text_is_truncated_to_budget() {
        let text = format!("{} #Minecraft #Building #Creative", "castle ".repeat(60));
        let candidate = validator().validate(&text, &request(Network::Bluesky), 100);

        assert!(candidate.text.chars().count() <= 100);
        assert_eq!(candidate.hashtag_count, 3);
        assert!(candidate.issues.iter().any(|i| i.kind == IssueKind::Truncated));
    }

    #[test]
    fn scorer_uses_configured_length_window() {
        let text = "Building a castle in creative mode tonight, come help with the towers #Minecraft #Building #Creative";

        let default = validator().validate(text, &request(Network::Mastodon), 450);
        assert!(!default.score_issues.iter().any(|i| i.starts_with("length")));

        let mut config = GuardrailConfig::default();
        config.length_windows.insert("mastodon".into(), (150, 400));
        let strict = Validator::new(Arc::new(config)).unwrap();
        let candidate = strict.validate(text, &request(Network::Mastodon), 450);
        assert!(candidate
            .score_issues
            .iter()
            .any(|i| i.starts_with("length") && i.ends_with("150..=400")));
    }

    #[test]
    fn stripping_everything_is_fatal() {
        let candidate = validator().validate("#ChiefGyk3D", &request(Network::Discord), 450);
        assert_eq!(candidate.text, "");
        assert!(candidate.fatal_issues().any(|i| i.kind == IssueKind::Empty));
    }
}
