//! # Quality scoring
//!
//! A heuristic 0-10 grade for generated announcements. The score is
//! advisory unless `min_quality_score` is configured above zero.

use std::collections::HashSet;

use itertools::Itertools;

use crate::config::Vocabulary;

pub const MAX_SCORE: u8 = 10;

const FILLER_PENALTY: u8 = 2;
const LENGTH_PENALTY: u8 = 2;
const TITLE_PENALTY: u8 = 3;
const REPETITION_PENALTY: u8 = 2;

/// More filler phrases than this costs points.
const MAX_FILLER_PHRASES: usize = 2;
/// Minimum length of a word counted towards repetition.
const MIN_REPEATED_WORD_LEN: usize = 4;
const MAX_WORD_REPEATS: usize = 2;

#[derive(Debug, Clone)]
pub struct QualityScorer {
    filler_phrases: Vec<String>,
    stopwords: HashSet<String>,
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

impl QualityScorer {
    pub fn new(vocabulary: &Vocabulary) -> Self {
        QualityScorer {
            filler_phrases: vocabulary
                .filler_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            stopwords: vocabulary
                .stopwords
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
        }
    }

    /// Grades `text` and lists the deductions made. `length_window` is the
    /// inclusive character range a well-sized post falls into.
    pub fn score(&self, text: &str, title: &str, length_window: (usize, usize)) -> (u8, Vec<String>) {
        let lowered = text.to_lowercase();
        let mut deductions = 0u8;
        let mut issues = Vec::new();

        let fillers = self
            .filler_phrases
            .iter()
            .filter(|p| lowered.contains(p.as_str()))
            .collect_vec();
        if fillers.len() > MAX_FILLER_PHRASES {
            deductions += FILLER_PENALTY;
            issues.push(format!("generic phrases: {}", fillers.iter().join(", ")));
        }

        let length = text.chars().count();
        let (min, max) = length_window;
        if length < min || length > max {
            deductions += LENGTH_PENALTY;
            issues.push(format!("length {length} outside {min}..={max}"));
        }

        let title_words = words(title)
            .filter(|w| w.chars().count() >= 3 && !self.stopwords.contains(w))
            .collect_vec();
        let message_words = words(text).collect::<HashSet<_>>();
        let mentions_title = title_words.iter().any(|t| {
            message_words
                .iter()
                .any(|m| m == t || (t.len() >= 4 && m.len() >= 4 && (m.starts_with(t.as_str()) || t.starts_with(m.as_str()))))
        });
        if !title_words.is_empty() && !mentions_title {
            deductions += TITLE_PENALTY;
            issues.push("does not mention the stream title".to_string());
        }

        let repeated = words(text)
            .filter(|w| w.chars().count() >= MIN_REPEATED_WORD_LEN && !self.stopwords.contains(w))
            .counts()
            .into_iter()
            .filter(|(_, n)| *n > MAX_WORD_REPEATS)
            .map(|(w, _)| w)
            .sorted()
            .collect_vec();
        if !repeated.is_empty() {
            deductions += REPETITION_PENALTY;
            issues.push(format!("repeated words: {}", repeated.join(", ")));
        }

        (MAX_SCORE.saturating_sub(deductions), issues)
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        QualityScorer::new(&Vocabulary::default())
    }
}
