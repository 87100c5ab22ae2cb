use std::sync::{Arc, Mutex};
use post_history::PostHistory;

/// Accepts every post and remembers what was recorded.
#[derive(Clone, Default)]
pub struct MockHistory {
    pub recorded: Arc<Mutex<Vec<String>>>,
}

impl PostHistory for MockHistory {
    fn is_duplicate(&self, _text: &str) -> bool {
        false
    }

    fn record(&self, text: &str) {
        self.recorded.lock().unwrap().push(text.to_string());
    }

    fn record_if_unique(&self, text: &str) -> bool {
        self.record(text);
        true
    }
}
