pub mod memory;

/// A record of announcements that have already been sent out.
pub trait PostHistory {
    /// Whether `text` matches, exactly or approximately, a recorded post.
    fn is_duplicate(&self, text: &str) -> bool;

    /// Records `text` as emitted, evicting the oldest entry when full.
    fn record(&self, text: &str);

    /// Checks and records in one step. Returns `true` when `text` was new
    /// and has been recorded, `false` when it was rejected as a duplicate.
    fn record_if_unique(&self, text: &str) -> bool;
}

impl<T: PostHistory> PostHistory for &T {
    fn is_duplicate(&self, text: &str) -> bool {
        (**self).is_duplicate(text)
    }

    fn record(&self, text: &str) {
        (**self).record(text)
    }

    fn record_if_unique(&self, text: &str) -> bool {
        (**self).record_if_unique(text)
    }
}

impl<T: PostHistory> PostHistory for std::sync::Arc<T> {
    fn is_duplicate(&self, text: &str) -> bool {
        (**self).is_duplicate(text)
    }

    fn record(&self, text: &str) {
        (**self).record(text)
    }

    fn record_if_unique(&self, text: &str) -> bool {
        (**self).record_if_unique(text)
    }
}
