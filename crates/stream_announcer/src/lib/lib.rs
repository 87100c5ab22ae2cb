pub mod budget;
pub mod config;
mod error;
pub mod extractor;
mod llm;
mod pipeline;
pub mod scorer;
pub mod tracing;
pub mod types;
pub mod validation;

pub use config::{GuardrailConfig, ProfanitySeverity, RejectPolicy, Vocabulary};
pub use error::Error;
pub use llm::openai;
pub use llm::{
    prompts::build_prompt,
    rate_limit::{GenerationCore, RateLimiter, RetryPolicy},
    Generator, Prompt,
};
pub use pipeline::{builder::AnnouncementPipelineBuilder, AnnouncementPipeline};
pub use types::{Direction, GenerationRequest, Network};
