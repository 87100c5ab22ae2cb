//! Vocabulary driven checks: clickbait words, profanity tiers and facts
//! the backend is not allowed to invent.

use itertools::Itertools;
use regex::Regex;

use crate::{
    config::{FactPattern, ProfanitySeverity, ProfanityTiers},
    validation::{IssueKind, ValidationIssue},
    Error,
};

/// Case-insensitive whole-word matcher over a fixed word list. Substrings
/// of longer words never match (`fire` does not match `firewall`).
#[derive(Debug, Clone)]
pub struct WordMatcher {
    regex: Option<Regex>,
}

impl WordMatcher {
    pub fn new(label: &str, words: &[String]) -> Result<Self, Error> {
        let alternatives = words
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .sorted_by_key(|w| std::cmp::Reverse(w.len()))
            .map(regex::escape)
            .join("|");

        if alternatives.is_empty() {
            return Ok(WordMatcher { regex: None });
        }

        let regex = Regex::new(&format!(r"(?i)\b(?:{alternatives})\b")).map_err(|source| {
            Error::Pattern {
                label: label.to_string(),
                source,
            }
        })?;
        Ok(WordMatcher { regex: Some(regex) })
    }

    /// Distinct matched words, lowercased, in order of first appearance.
    pub fn find_all(&self, text: &str) -> Vec<String> {
        let Some(regex) = &self.regex else {
            return Vec::new();
        };
        regex
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .unique()
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ForbiddenWords(WordMatcher);

impl ForbiddenWords {
    pub fn new(words: &[String]) -> Result<Self, Error> {
        Ok(ForbiddenWords(WordMatcher::new("forbidden_words", words)?))
    }

    pub fn check(&self, text: &str) -> Option<ValidationIssue> {
        let found = self.0.find_all(text);
        (!found.is_empty())
            .then(|| ValidationIssue::new(IssueKind::ForbiddenWord, found.join(", ")))
    }
}

#[derive(Debug, Clone)]
pub struct ProfanityFilter {
    tiers: Vec<(ProfanitySeverity, WordMatcher)>,
}

impl ProfanityFilter {
    pub fn new(tiers: &ProfanityTiers) -> Result<Self, Error> {
        Ok(ProfanityFilter {
            tiers: vec![
                (ProfanitySeverity::Mild, WordMatcher::new("profanity.mild", &tiers.mild)?),
                (
                    ProfanitySeverity::Moderate,
                    WordMatcher::new("profanity.moderate", &tiers.moderate)?,
                ),
                (ProfanitySeverity::Severe, WordMatcher::new("profanity.severe", &tiers.severe)?),
            ],
        })
    }

    /// Checking at `severity` flags words from that tier and every milder
    /// tier.
    pub fn check(&self, text: &str, severity: ProfanitySeverity) -> Option<ValidationIssue> {
        let found = self
            .tiers
            .iter()
            .filter(|(tier, _)| *tier <= severity)
            .flat_map(|(_, matcher)| matcher.find_all(text))
            .collect_vec();

        (!found.is_empty()).then(|| ValidationIssue::new(IssueKind::Profanity, found.join(", ")))
    }
}

/// Detects facts (viewer counts, giveaways, clock times...) the backend
/// invented. A fact that also appears in the stream title was supplied by
/// the streamer and is not reported.
#[derive(Debug, Clone)]
pub struct FactDetector {
    patterns: Vec<(String, Regex)>,
}

impl FactDetector {
    pub fn new(patterns: &[FactPattern]) -> Result<Self, Error> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("(?i){}", p.pattern))
                    .map(|re| (p.label.clone(), re))
                    .map_err(|source| Error::Pattern {
                        label: p.label.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FactDetector { patterns })
    }

    pub fn check(&self, text: &str, title: &str) -> Vec<ValidationIssue> {
        self.patterns
            .iter()
            .filter(|(_, re)| !re.is_match(title))
            .filter_map(|(label, re)| {
                re.find(text).map(|m| {
                    ValidationIssue::new(
                        IssueKind::HallucinatedFact,
                        format!("{label}: \"{}\"", m.as_str()),
                    )
                })
            })
            .collect()
    }
}
