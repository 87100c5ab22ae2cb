use std::collections::BTreeSet;

/// Overlap ratio above which two texts count as the same announcement.
pub const DUPLICATE_THRESHOLD: f32 = 0.8;

/// Lowercased word tokens of `text`, hashtag markers and punctuation removed.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard overlap of the word tokens of `a` and `b`, in `0.0..=1.0`.
pub fn token_overlap(a: &str, b: &str) -> f32 {
    let a = tokenize(a);
    let b = tokenize(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let inter = a.intersection(&b).count() as f32;
    let union = a.union(&b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        inter / union
    }
}
