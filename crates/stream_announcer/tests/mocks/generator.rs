use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};
use stream_announcer::{Generator, Prompt};

/// Replays scripted backend responses in order. Once the script runs out
/// every call fails with a non-retryable error.
#[derive(Clone)]
pub struct MockGenerator {
    pub script: Arc<Mutex<VecDeque<Result<String, String>>>>,
    pub calls: Arc<Mutex<Vec<Prompt>>>,
}

impl MockGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scripted(responses.into_iter().map(|r| Ok(r.into())))
    }

    pub fn scripted(script: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self::scripted([Err(msg.to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Generator for MockGenerator {
    type Error = anyhow::Error;

    fn model(&self) -> &str {
        "mock-llm"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, Self::Error> {
        self.calls.lock().unwrap().push(prompt.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(anyhow::anyhow!("{}", msg)),
            None => Err(anyhow::anyhow!("invalid request: no scripted response left")),
        }
    }
}
