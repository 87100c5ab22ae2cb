use std::sync::Arc;

use post_history::{DedupCache, PostHistory};

use crate::{
    config::{GuardrailConfig, RejectPolicy},
    llm::{
        rate_limit::{GenerationCore, RateLimiter, RetryPolicy},
        Generator,
    },
    validation::Validator,
    AnnouncementPipeline, Error,
};

pub struct AnnouncementPipelineBuilder<G = (), H = ()> {
    config: GuardrailConfig,
    generator: G,
    history: H,
    limiter: Option<Arc<RateLimiter>>,
}

impl AnnouncementPipelineBuilder {
    pub fn new(config: GuardrailConfig) -> Self {
        Self {
            config,
            generator: (),
            history: (),
            limiter: None,
        }
    }
}

impl<G, H> AnnouncementPipelineBuilder<G, H> {
    pub fn generator<G2: Generator + Sync>(self, generator: G2) -> AnnouncementPipelineBuilder<G2, H> {
        AnnouncementPipelineBuilder {
            config: self.config,
            generator,
            history: self.history,
            limiter: self.limiter,
        }
    }

    pub fn history<H2: PostHistory + Sync>(self, history: H2) -> AnnouncementPipelineBuilder<G, H2> {
        AnnouncementPipelineBuilder {
            config: self.config,
            generator: self.generator,
            history,
            limiter: self.limiter,
        }
    }

    /// Uses an in-memory [`DedupCache`] sized from `dedup_cache_size`.
    pub fn with_dedup_cache(self) -> AnnouncementPipelineBuilder<G, DedupCache> {
        let capacity = self.config.dedup_cache_size;
        self.history(DedupCache::new(capacity))
    }

    /// Shares an existing limiter, so pacing spans several pipelines.
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn reject_policy(mut self, policy: RejectPolicy) -> Self {
        self.config.reject_policy = policy;
        self
    }

    pub fn emit_on_advisory(mut self, emit: bool) -> Self {
        self.config.emit_on_advisory = emit;
        self
    }
}

impl<G, H> AnnouncementPipelineBuilder<G, H>
where
    G: Generator + Sync,
    H: PostHistory + Sync,
{
    pub fn build(self) -> Result<AnnouncementPipeline<G, H>, Error> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::from_config(&config)));
        let core = GenerationCore::new(self.generator, limiter, RetryPolicy::from_config(&config));
        let validator = Validator::new(Arc::clone(&config))?;

        tracing::debug!(
            model = core.generator().model(),
            max_concurrent = core.limiter().max_concurrent(),
            policy = ?config.reject_policy,
            "Built announcement pipeline"
        );

        Ok(AnnouncementPipeline {
            core,
            validator,
            history: self.history,
            config,
        })
    }
}
