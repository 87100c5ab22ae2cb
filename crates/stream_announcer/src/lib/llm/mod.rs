pub mod openai;
pub mod prompts;
pub mod rate_limit;

use std::{fmt::Display, future::Future};

/// A rendered request to the generative backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// A generative text backend.
///
/// Implementations perform exactly one call; pacing, concurrency limits
/// and retries are layered on top by [`rate_limit::GenerationCore`].
pub trait Generator {
    type Error: Display + Send;

    fn model(&self) -> &str;

    fn generate(&self, prompt: &Prompt)
        -> impl Future<Output = Result<String, Self::Error>> + Send;
}
