use std::sync::LazyLock;

use itertools::Itertools;
use regex::{Captures, Regex};

use crate::validation::{IssueKind, ValidationIssue};

static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#([[:alnum:]]+)").unwrap());

/// Tag texts (without `#`) in order of appearance.
pub fn hashtags(text: &str) -> Vec<&str> {
    HASHTAG_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

pub fn count(text: &str) -> usize {
    HASHTAG_RE.find_iter(text).count()
}

/// Count mismatches are never auto-fixed: adding or dropping a tag changes
/// what the post says.
pub fn check_count(text: &str, expected: usize) -> Option<ValidationIssue> {
    let found = count(text);
    (found != expected).then(|| {
        ValidationIssue::new(
            IssueKind::HashtagCount,
            format!("expected {expected}, found {found}"),
        )
    })
}

/// Case-insensitive pieces of `username` that must not appear as hashtags:
/// the full name (also without underscores), then the underscore and
/// camel-case segments that are at least three characters long.
pub fn username_segments(username: &str) -> Vec<String> {
    let username = username.trim().trim_start_matches('@');
    let mut segments = vec![username.to_lowercase(), username.replace('_', "").to_lowercase()];

    for part in username.split('_').filter(|p| !p.is_empty()) {
        segments.push(part.to_lowercase());
        segments.extend(split_camel_case(part).into_iter().map(str::to_lowercase));
    }

    segments
        .into_iter()
        .enumerate()
        .filter(|(i, s)| !s.is_empty() && (*i == 0 || s.chars().count() >= 3))
        .map(|(_, s)| s)
        .unique()
        .collect()
}

/// Splits on lowercase-to-uppercase transitions: `ChiefGyk3D` gives
/// `Chief` and `Gyk3D`.
fn split_camel_case(word: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;

    for (idx, ch) in word.char_indices() {
        if let Some(p) = prev {
            if p.is_lowercase() && ch.is_uppercase() {
                parts.push(&word[start..idx]);
                start = idx;
            }
        }
        prev = Some(ch);
    }
    parts.push(&word[start..]);
    parts
}

/// Removes hashtags derived from `username`. Returns the repaired text and
/// the tags that were stripped.
pub fn strip_username_hashtags(text: &str, username: &str) -> (String, Vec<String>) {
    let segments = username_segments(username);
    if segments.is_empty() {
        return (text.to_string(), Vec::new());
    }

    let mut stripped = Vec::new();
    let repaired = HASHTAG_RE.replace_all(text, |caps: &Captures| {
        let tag = &caps[1];
        if segments.contains(&tag.to_lowercase()) {
            stripped.push(caps[0].to_string());
            String::new()
        } else {
            caps[0].to_string()
        }
    });

    if stripped.is_empty() {
        return (text.to_string(), stripped);
    }
    (normalize_whitespace(&repaired), stripped)
}

/// Collapses runs of spaces left behind by removals, line by line.
fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().join(" "))
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_count_is_valid() {
        let text = "#Minecraft #Building #Creative";
        assert_eq!(count(text), 3);
        assert!(check_count(text, 3).is_none());
    }

    #[test]
    fn mismatched_count_is_reported() {
        let issue = check_count("#Minecraft #Building #Creative", 2).unwrap();
        assert_eq!(issue.kind, IssueKind::HashtagCount);
        assert!(issue.to_string().contains("hashtag count"));
        assert!(issue.detail.contains("expected 2, found 3"));
    }

    #[test]
    fn username_is_split_on_camel_case_and_underscores() {
        assert_eq!(username_segments("ChiefGyk3D"), vec!["chiefgyk3d", "chief", "gyk3d"]);
        assert_eq!(
            username_segments("the_RustyGamer"),
            vec!["the_rustygamer", "therustygamer", "the", "rustygamer", "rusty", "gamer"]
        );
    }

    #[test]
    fn short_segments_are_dropped_but_short_usernames_kept() {
        assert_eq!(username_segments("Jo"), vec!["jo"]);
        assert_eq!(username_segments("xXJoXx"), vec!["xxjoxx", "xjo"]);
    }

    #[test]
    fn username_hashtags_are_stripped() {
        let (text, stripped) = strip_username_hashtags(
            "Building a castle tonight! #Chief #Gyk3D #Minecraft",
            "ChiefGyk3D",
        );
        assert_eq!(text, "Building a castle tonight! #Minecraft");
        assert_eq!(stripped, vec!["#Chief", "#Gyk3D"]);
    }

    #[test]
    fn full_username_hashtag_is_stripped_case_insensitively() {
        let (text, stripped) =
            strip_username_hashtags("Live now #chiefgyk3d #Linux #Homelab", "ChiefGyk3D");
        assert_eq!(text, "Live now #Linux #Homelab");
        assert_eq!(stripped.len(), 1);
    }

    #[test]
    fn unrelated_text_is_untouched() {
        let original = "Live now!  Spacing   kept #Linux";
        let (text, stripped) = strip_username_hashtags(original, "ChiefGyk3D");
        assert_eq!(text, original);
        assert!(stripped.is_empty());
    }
}
