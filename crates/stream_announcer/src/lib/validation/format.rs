use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

use crate::{
    types::Network,
    validation::{IssueKind, ValidationIssue},
};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bhttps?://\S+").unwrap());

static MASS_PING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)@(?:everyone|here)\b").unwrap());

static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|\s)(@\S+)").unwrap());

static MASTODON_HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@[A-Za-z0-9_]+(?:@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+)?$").unwrap()
});

static BLUESKY_HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+$").unwrap());

static HTML_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)&(?:amp|lt|gt|quot|apos|nbsp|#\d+|#x[0-9a-f]+);").unwrap()
});

static MARKDOWN_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]\([^)]*\)").unwrap());

/// Links are appended by the caller; the backend must never embed one.
pub fn check_bare_urls(text: &str) -> Option<ValidationIssue> {
    let urls = URL_RE.find_iter(text).map(|m| m.as_str()).collect_vec();
    (!urls.is_empty()).then(|| ValidationIssue::new(IssueKind::BareUrl, urls.join(", ")))
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x1F1E6..=0x1F1FF | 0x1F004 | 0x1F0CF | 0x2B50 | 0x2B55
    )
}

pub fn emoji_count(text: &str) -> usize {
    text.chars().filter(|c| is_emoji(*c)).count()
}

pub fn check_emoji(text: &str, max: usize) -> Option<ValidationIssue> {
    let found = emoji_count(text);
    (found > max).then(|| {
        ValidationIssue::new(IssueKind::EmojiCount, format!("{found} emoji, at most {max} allowed"))
    })
}

/// Network dependent formatting rules. Unknown networks have none.
///
/// Embedded URLs are covered by [`check_bare_urls`] for every network and
/// are not reported again here.
pub fn check_network_formatting(text: &str, network: &Network) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if network.is_chat_style() {
        issues.extend(check_chat_markdown(text));
    }
    if network.is_link_card() {
        issues.extend(check_mentions(text, network));
    }
    if network.renders_literal_text() {
        issues.extend(check_literal_markup(text));
    }
    issues
}

fn formatting(detail: impl Into<String>) -> ValidationIssue {
    ValidationIssue::new(IssueKind::Formatting, detail)
}

fn check_chat_markdown(text: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if text.matches("**").count() % 2 != 0 {
        issues.push(formatting("unbalanced bold markers (**)"));
    }
    if text.replace("**", "").matches('*').count() % 2 != 0 {
        issues.push(formatting("unbalanced italic markers (*)"));
    }
    if text.matches("__").count() % 2 != 0 {
        issues.push(formatting("unbalanced underline markers (__)"));
    }
    if text.matches("~~").count() % 2 != 0 {
        issues.push(formatting("unbalanced strikethrough markers (~~)"));
    }
    if let Some(ping) = MASS_PING_RE.find(text) {
        issues.push(formatting(format!("mass mention {}", ping.as_str())));
    }

    issues
}

fn check_mentions(text: &str, network: &Network) -> Vec<ValidationIssue> {
    let handle_re = match network {
        Network::Bluesky => &*BLUESKY_HANDLE_RE,
        Network::Mastodon => &*MASTODON_HANDLE_RE,
        _ => return Vec::new(),
    };

    MENTION_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches(|c: char| ".,!?:;)'\"".contains(c)))
        .filter(|mention| !handle_re.is_match(mention))
        .map(|mention| formatting(format!("malformed {network} mention {mention}")))
        .collect()
}

fn check_literal_markup(text: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if let Some(entity) = HTML_ENTITY_RE.find(text) {
        issues.push(formatting(format!("HTML entity {} shown literally", entity.as_str())));
    }
    if text.contains("**") || text.contains("__") || MARKDOWN_LINK_RE.is_match(text) {
        issues.push(formatting("markdown is not rendered"));
    }
    issues
}

fn is_hashtag_word(word: &str) -> bool {
    word.strip_prefix('#')
        .is_some_and(|tag| !tag.is_empty() && tag.chars().all(char::is_alphanumeric))
}

/// Shortens `text` to at most `max_chars`, cutting at a word boundary and
/// keeping a trailing block of hashtags intact where it fits. Returns
/// `None` when the text already fits.
pub fn truncate_to_budget(text: &str, max_chars: usize) -> Option<String> {
    if text.chars().count() <= max_chars {
        return None;
    }

    let words = text.split_whitespace().collect_vec();
    let tail_start = words
        .iter()
        .rposition(|w| !is_hashtag_word(w))
        .map_or(0, |i| i + 1);
    let (body, tags) = words.split_at(tail_start);
    let tags = tags.join(" ");

    let body_budget = if tags.is_empty() {
        max_chars
    } else {
        max_chars.saturating_sub(tags.chars().count() + 1)
    };

    let mut kept = String::new();
    for word in body {
        let sep = usize::from(!kept.is_empty());
        if kept.chars().count() + sep + word.chars().count() > body_budget {
            break;
        }
        if sep == 1 {
            kept.push(' ');
        }
        kept.push_str(word);
    }

    let joined = match (kept.is_empty(), tags.is_empty()) {
        (_, true) => kept,
        (true, false) => tags,
        (false, false) => format!("{kept} {tags}"),
    };

    if joined.chars().count() <= max_chars {
        Some(joined)
    } else {
        Some(joined.chars().take(max_chars).collect::<String>().trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_urls_are_rejected() {
        let issue = check_bare_urls("Watch at https://twitch.tv/someone now").unwrap();
        assert_eq!(issue.kind, IssueKind::BareUrl);
        assert_eq!(issue.detail, "https://twitch.tv/someone");
        assert!(check_bare_urls("Live on twitch now #Rust").is_none());
    }

    #[test]
    fn emoji_are_counted() {
        assert_eq!(emoji_count("Live now 🎮🔥 with ☕"), 3);
        assert!(check_emoji("🎮🎮🎮🎮", 3).is_some());
        assert!(check_emoji("🎮 live", 3).is_none());
    }

    #[test]
    fn chat_networks_need_balanced_markdown() {
        let issues = check_network_formatting("**Live now* with *friends", &Network::Discord);
        assert!(issues.iter().any(|i| i.detail.contains("bold")));
        assert!(check_network_formatting("**Live now** with *friends*", &Network::Discord).is_empty());
    }

    #[test]
    fn chat_networks_reject_mass_pings() {
        let issues = check_network_formatting("@everyone live now", &Network::Matrix);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].detail.contains("@everyone"));
    }

    #[test]
    fn mastodon_mentions_must_be_well_formed() {
        assert!(check_network_formatting(
            "Playing with @friend and @pal@mastodon.social!",
            &Network::Mastodon
        )
        .is_empty());
        let issues = check_network_formatting("Playing with @pal@ tonight", &Network::Mastodon);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].detail.contains("@pal@"));
    }

    #[test]
    fn bluesky_mentions_need_a_domain_handle() {
        assert!(check_network_formatting("Co-op with @pal.bsky.social", &Network::Bluesky).is_empty());
        assert_eq!(
            check_network_formatting("Co-op with @pal", &Network::Bluesky).len(),
            1
        );
    }

    #[test]
    fn literal_networks_reject_entities_and_markdown() {
        let issues = check_network_formatting("Rust &amp; Linux **tonight**", &Network::Bluesky);
        assert_eq!(issues.len(), 2);
        assert!(check_network_formatting("Rust &amp; Linux", &Network::Discord).is_empty());
    }

    #[test]
    fn unknown_networks_skip_formatting() {
        let text = "**broken @everyone &amp; @pal@";
        assert!(check_network_formatting(text, &Network::from("threads")).is_empty());
    }

    #[test]
    fn truncation_keeps_trailing_hashtags() {
        let text = "Going live with a very long description of everything planned for tonight #Rust #Linux";
        let cut = truncate_to_budget(text, 50).unwrap();
        assert!(cut.chars().count() <= 50);
        assert!(cut.ends_with("#Rust #Linux"), "{cut}");
        assert!(cut.starts_with("Going live"));
    }

    #[test]
    fn short_text_is_not_truncated() {
        assert!(truncate_to_budget("Live now #Rust", 50).is_none());
    }

    #[test]
    fn text_without_hashtags_is_cut_at_word_boundary() {
        let cut = truncate_to_budget("one two three four five six", 14).unwrap();
        assert_eq!(cut, "one two three");
    }
}
