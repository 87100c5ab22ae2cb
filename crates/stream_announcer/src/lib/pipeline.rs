pub mod builder;

use std::sync::Arc;

use futures::future::join_all;
use itertools::Itertools;
use post_history::PostHistory;

use crate::{
    budget::{append_link, content_max},
    config::{GuardrailConfig, RejectPolicy},
    extractor::{clean_answer, extract_post, looks_like_reasoning, strip_think_blocks},
    llm::{prompts::build_prompt, rate_limit::GenerationCore, Generator},
    types::{Direction, GenerationRequest},
    validation::{Candidate, IssueKind, ValidationIssue, Validator},
};

/// Turns a [`GenerationRequest`] into a post that is safe to publish.
///
/// Every failure degrades to `None`, which tells the caller to post its
/// own template message instead.
#[derive(Debug)]
pub struct AnnouncementPipeline<G, H> {
    core: GenerationCore<G>,
    validator: Validator,
    history: H,
    config: Arc<GuardrailConfig>,
}

impl<G, H> AnnouncementPipeline<G, H>
where
    G: Generator + Sync,
    H: PostHistory + Sync,
{
    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn core(&self) -> &GenerationCore<G> {
        &self.core
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    fn attempts(&self) -> u32 {
        match self.config.reject_policy {
            RejectPolicy::Regenerate { extra_attempts } => extra_attempts.saturating_add(1),
            RejectPolicy::Fallback => 1,
        }
    }

    /// Recovers the post from raw backend output.
    ///
    /// Think blocks are always removed. The reasoning extractor only runs
    /// when what is left reads like reasoning, or when a thinking model
    /// quoted a draft. Anything else is the answer as a whole. `None` means
    /// nothing postable was found.
    pub fn prepare(&self, raw: &str, request: &GenerationRequest) -> Option<String> {
        let stripped = strip_think_blocks(raw);
        let quoted_draft = stripped.lines().any(|l| l.trim_start().starts_with('>'));

        let text = if looks_like_reasoning(&stripped) || (request.is_thinking_model && quoted_draft) {
            extract_post(&stripped)?
        } else {
            clean_answer(&stripped)
        };

        (!text.trim().is_empty()).then_some(text)
    }

    /// Validates and scores `text`. A configured minimum score turns a low
    /// grade into a fatal issue.
    pub fn evaluate(&self, text: &str, request: &GenerationRequest, content_max: usize) -> Candidate {
        let mut candidate = self.validator.validate(text, request, content_max);

        let min_score = self.config.min_quality_score;
        if min_score > 0 && candidate.score < min_score {
            let detail = format!(
                "score {} below {min_score} ({})",
                candidate.score,
                candidate.score_issues.join("; ")
            );
            candidate.push_issue(ValidationIssue::new(IssueKind::LowQuality, detail));
        }

        candidate
    }

    /// Generates, repairs and validates an announcement, regenerating per
    /// the configured [`RejectPolicy`]. Accepted texts are recorded in the
    /// post history; the returned text does not include the link.
    #[tracing::instrument(
        skip_all,
        fields(
            network = %request.network,
            direction = %request.direction,
            username = %request.username
        )
    )]
    pub async fn generate(&self, request: &GenerationRequest) -> Option<String> {
        let content_max = content_max(
            &self.config,
            &request.network,
            request.direction,
            request.url.as_deref(),
        );
        let hashtag_count = self
            .config
            .expected_hashtags(request.direction, &request.network);
        let prompt = build_prompt(request, content_max, hashtag_count);
        let attempts = self.attempts();

        for attempt in 1..=attempts {
            let raw = self.core.generate(&prompt).await?;

            let Some(text) = self.prepare(&raw, request) else {
                tracing::warn!(attempt, "No usable post found in backend output");
                return None;
            };

            let mut candidate = self.evaluate(&text, request, content_max);

            for repair in candidate
                .issues
                .iter()
                .filter(|i| matches!(i.kind, IssueKind::UsernameHashtag | IssueKind::Truncated))
            {
                tracing::debug!(attempt, repair = %repair, "Repaired candidate");
            }

            if !candidate.is_emittable(self.config.emit_on_advisory) {
                let issues = candidate
                    .fatal_issues()
                    .chain(candidate.advisory_issues())
                    .join("; ");
                tracing::warn!(attempt, attempts, %issues, "Rejected candidate");
                continue;
            }

            if !self.history.record_if_unique(&candidate.text) {
                candidate.push_issue(ValidationIssue::new(
                    IssueKind::Duplicate,
                    "matches a recent announcement",
                ));
                tracing::warn!(attempt, attempts, "Rejected candidate as a near duplicate");
                continue;
            }

            if candidate.has_advisory() {
                let issues = candidate.advisory_issues().join("; ");
                tracing::warn!(%issues, "Emitting announcement with advisory issues");
            }

            tracing::info!(
                attempt,
                score = candidate.score,
                hashtags = candidate.hashtag_count,
                chars = candidate.text.chars().count(),
                "Announcement accepted"
            );
            return Some(candidate.text);
        }

        tracing::warn!(attempts, "No acceptable announcement produced");
        None
    }

    /// [`Self::generate`] followed by appending the request's link to
    /// start messages. End messages never carry one.
    pub async fn announce(&self, request: &GenerationRequest) -> Option<String> {
        let text = self.generate(request).await?;
        match request.direction {
            Direction::Start => Some(append_link(&text, request.url.as_deref())),
            Direction::End => Some(text),
        }
    }

    /// [`Self::announce`] for several requests concurrently. Results keep
    /// the order of `requests`.
    pub async fn announce_many(&self, requests: &[GenerationRequest]) -> Vec<Option<String>> {
        join_all(requests.iter().map(|request| self.announce(request))).await
    }

    /// Generates for several requests concurrently. Results keep the
    /// order of `requests`.
    pub async fn generate_many(&self, requests: &[GenerationRequest]) -> Vec<Option<String>> {
        join_all(requests.iter().map(|request| self.generate(request))).await
    }
}
