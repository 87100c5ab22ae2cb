//! # Thinking-trace extraction
//!
//! Reasoning models often answer with their chain of thought, sometimes
//! with the real post buried inside it. This module recovers the post with
//! an ordered list of independent strategies; the first one that finds
//! something wins. When none does, the caller must fall back to a template
//! rather than publish reasoning text.

use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

static THINK_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(think|thinking|reasoning)>.*?</(think|thinking|reasoning)>").unwrap()
});

static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#[[:alnum:]]+").unwrap());

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:final\s+(?:post|answer|version)|here'?s\s+(?:the|my)\s+(?:final\s+)?post|here\s+is\s+(?:the|my)\s+(?:final\s+)?post)\s*:",
    )
    .unwrap()
});

/// Openers that mark a model thinking aloud instead of answering.
const REASONING_OPENERS: &[&str] = &[
    "okay",
    "ok,",
    "ok so",
    "alright",
    "hmm",
    "let me",
    "let's see",
    "lets see",
    "first,",
    "i need to",
    "i should",
    "i'll",
    "the user",
    "we need",
    "so the",
];

/// Quoted answers shorter than this are fragments, not posts.
pub const MIN_QUOTED_LENGTH: usize = 20;

/// A single extraction heuristic.
pub type Strategy = fn(&str) -> Option<String>;

/// Strategies in the order they are tried.
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("quoted_lines", quoted_lines),
    ("marker_phrase", marker_phrase),
    ("hashtag_line", hashtag_line),
];

/// Removes `<think>...</think>` style blocks and an unterminated opening
/// block's tag, keeping whatever the model wrote outside of them.
pub fn strip_think_blocks(raw: &str) -> String {
    let stripped = THINK_BLOCK_RE.replace_all(raw, "");
    let stripped = stripped
        .replace("<think>", "")
        .replace("</think>", "");
    stripped.trim().to_string()
}

/// Heuristic check for text that reads like reasoning rather than a post.
pub fn looks_like_reasoning(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    if text.contains("<think") {
        return true;
    }

    opens_with_reasoning(text) || MARKER_RE.is_match(text)
}

fn opens_with_reasoning(line: &str) -> bool {
    let lowered = line.trim().to_lowercase();
    REASONING_OPENERS
        .iter()
        .any(|opener| lowered.starts_with(opener))
}

fn is_tags_only(line: &str) -> bool {
    HASHTAG_RE.replace_all(line, "").trim().is_empty()
}

/// Runs every strategy in order and returns the first match.
pub fn extract_post(raw: &str) -> Option<String> {
    let text = strip_think_blocks(raw);
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let found = strategy(&text)?;
        tracing::debug!(strategy = *name, "Extracted post from reasoning trace");
        Some(found)
    })
}

/// Consecutive lines starting with `>`, joined with spaces.
pub fn quoted_lines(text: &str) -> Option<String> {
    let blocks = text
        .lines()
        .map(str::trim_start)
        .chunk_by(|line| line.starts_with('>'));

    let found = (&blocks)
        .into_iter()
        .filter(|(quoted, _)| *quoted)
        .map(|(_, lines)| {
            lines
                .map(|line| line.trim_start_matches('>').trim())
                .filter(|line| !line.is_empty())
                .join(" ")
        })
        .map(|block| clean_answer(&block))
        .find(|block| block.chars().count() >= MIN_QUOTED_LENGTH);
    found
}

/// Text after a "final post:" style marker. When the marker ends its line
/// the next non-empty line is taken instead.
pub fn marker_phrase(text: &str) -> Option<String> {
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some(marker) = MARKER_RE.find(line) else {
            continue;
        };
        let rest = clean_answer(&line[marker.end()..]);
        if !rest.is_empty() {
            return Some(rest);
        }
        let next = lines
            .by_ref()
            .map(|l| clean_answer(l.trim_start_matches('>')))
            .find(|l| !l.is_empty());
        if next.is_some() {
            return next;
        }
    }
    None
}

/// The first line carrying a hashtag, the structural mark of a post.
///
/// A line of nothing but hashtags is the tail of a post, so it is joined
/// with the line above it. When that line is reasoning the match is skipped.
pub fn hashtag_line(text: &str) -> Option<String> {
    let lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect_vec();

    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| HASHTAG_RE.is_match(line))
        .find_map(|(idx, line)| {
            if !is_tags_only(line) {
                return Some(clean_answer(line)).filter(|post| !post.is_empty());
            }
            let body = lines[..idx].last()?;
            if is_tags_only(body) || opens_with_reasoning(body) || body.ends_with(':') {
                return None;
            }
            Some(clean_answer(&format!("{body}\n{line}")))
        })
}

/// Strips wrapping quotes, markdown emphasis around the whole answer and a
/// leading `Post:` label.
pub fn clean_answer(text: &str) -> String {
    let mut text = text.trim();

    for label in ["post:", "announcement:", "message:", "answer:"] {
        let labelled = text
            .get(..label.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(label));
        if labelled {
            text = text[label.len()..].trim_start();
        }
    }

    loop {
        let trimmed = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .or_else(|| text.strip_prefix('\u{201c}').and_then(|t| t.strip_suffix('\u{201d}')))
            .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')))
            .or_else(|| text.strip_prefix("**").and_then(|t| t.strip_suffix("**")))
            .or_else(|| text.strip_prefix('`').and_then(|t| t.strip_suffix('`')));
        match trimmed {
            Some(inner) => text = inner.trim(),
            None => break,
        }
    }

    text.to_string()
}
