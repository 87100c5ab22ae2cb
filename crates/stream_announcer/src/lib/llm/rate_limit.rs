//! # Rate-limited generation
//!
//! Every backend call goes through a shared [`RateLimiter`], which caps the
//! number of calls in flight and keeps a minimum spacing between dispatches
//! process-wide. [`GenerationCore`] layers exponential-backoff retries for
//! transient failures on top.
//!
//! The limiter is an ordinary value owned by whoever builds the pipeline,
//! so several pipelines can share one (wrap it in an [`Arc`]) and tests can
//! construct isolated instances.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, Semaphore, SemaphorePermit},
    time::Instant,
};

use crate::{
    config::GuardrailConfig,
    llm::{Generator, Prompt},
};

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub struct RateLimiter {
    permits: Semaphore,
    last_dispatch: Mutex<Option<Instant>>,
    min_delay: Duration,
    max_concurrent: usize,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, min_delay: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        RateLimiter {
            permits: Semaphore::new(max_concurrent),
            last_dispatch: Mutex::new(None),
            min_delay,
            max_concurrent,
        }
    }

    pub fn from_config(config: &GuardrailConfig) -> Self {
        RateLimiter::new(config.max_concurrent_calls, config.min_delay())
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a free call slot, then for the pacing window. The call may
    /// be dispatched as soon as this returns; the slot frees when the permit
    /// is dropped.
    pub async fn acquire(&self) -> Option<SemaphorePermit<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Rate limiter closed"))
            .ok()?;
        self.pace().await;
        Some(permit)
    }

    /// The lock is held while sleeping so that waiting callers queue up and
    /// dispatch one `min_delay` apart.
    async fn pace(&self) {
        let mut last_dispatch = self.last_dispatch.lock().await;
        if let Some(previous) = *last_dispatch {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                let wait = self.min_delay - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "Pacing backend call");
                tokio::time::sleep(wait).await;
            }
        }
        *last_dispatch = Some(Instant::now());
    }
}

/// When and how often a failed backend call is tried again.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before retry `k` is `delay_base^(k-1)` seconds.
    pub delay_base: f64,
    pub attempt_timeout: Option<Duration>,
    pub retryable_keywords: Vec<String>,
}

impl RetryPolicy {
    pub fn from_config(config: &GuardrailConfig) -> Self {
        RetryPolicy {
            max_retries: config.max_retries,
            delay_base: config.retry_delay_base,
            attempt_timeout: config.attempt_timeout(),
            retryable_keywords: config
                .vocabulary
                .retryable_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sleep before the 0-indexed `attempt`. The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        Duration::try_from_secs_f64(self.delay_base.powi(exponent))
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    /// Transient failures (unavailable, rate limited, quota, overload,
    /// timeout) are retried, anything else fails the call at once.
    pub fn is_retryable(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.retryable_keywords
            .iter()
            .any(|keyword| message.contains(keyword.as_str()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_config(&GuardrailConfig::default())
    }
}

#[derive(Debug, thiserror::Error)]
enum AttemptFailure {
    #[error("timeout after {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Backend(String),
    #[error("rate limiter closed")]
    Closed,
}

/// One logical "ask the backend for text" operation.
#[derive(Debug)]
pub struct GenerationCore<G> {
    generator: G,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl<G> GenerationCore<G>
where
    G: Generator + Sync,
{
    pub fn new(generator: G, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        GenerationCore {
            generator,
            limiter,
            retry,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Returns the trimmed backend text, or `None` once retries are
    /// exhausted or a non-retryable error occurs.
    #[tracing::instrument(skip_all, fields(model = %self.generator.model()))]
    pub async fn generate(&self, prompt: &Prompt) -> Option<String> {
        let max_attempts = self.retry.max_attempts();

        for attempt in 0..max_attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tracing::debug!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(prompt).await {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        tracing::warn!(attempt = attempt + 1, "Backend returned empty text");
                        return None;
                    }
                    return Some(text.to_string());
                }
                Err(failure) => {
                    let retryable = match &failure {
                        AttemptFailure::TimedOut(_) => true,
                        AttemptFailure::Backend(message) => self.retry.is_retryable(message),
                        AttemptFailure::Closed => false,
                    };
                    if !retryable {
                        tracing::error!(
                            attempt = attempt + 1,
                            error = %failure,
                            "Backend call failed with a non-retryable error"
                        );
                        return None;
                    }
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %failure,
                        "Backend call failed with a transient error"
                    );
                }
            }
        }

        tracing::error!(attempts = max_attempts, "Backend generation failed after all retries");
        None
    }

    async fn attempt(&self, prompt: &Prompt) -> Result<String, AttemptFailure> {
        let Some(_permit) = self.limiter.acquire().await else {
            return Err(AttemptFailure::Closed);
        };

        let call = self.generator.generate(prompt);
        let outcome = match self.retry.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| AttemptFailure::TimedOut(limit))?,
            None => call.await,
        };
        outcome.map_err(|e| AttemptFailure::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        future::Future,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex as StdMutex,
        },
    };

    use super::*;

    struct ScriptedGenerator {
        responses: StdMutex<VecDeque<Result<String, String>>>,
        dispatched_at: StdMutex<Vec<Instant>>,
        delay: Duration,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<&str, &str>>) -> Self {
            ScriptedGenerator {
                responses: StdMutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                dispatched_at: StdMutex::new(Vec::new()),
                delay: Duration::ZERO,
            }
        }

        fn slow(delay: Duration) -> Self {
            ScriptedGenerator {
                delay,
                ..ScriptedGenerator::new(vec![])
            }
        }

        fn calls(&self) -> usize {
            self.dispatched_at.lock().unwrap().len()
        }

        fn gaps(&self) -> Vec<Duration> {
            let times = self.dispatched_at.lock().unwrap();
            times.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    impl Generator for ScriptedGenerator {
        type Error = String;

        fn model(&self) -> &str {
            "scripted"
        }

        fn generate(&self, _prompt: &Prompt) -> impl Future<Output = Result<String, String>> + Send {
            self.dispatched_at.lock().unwrap().push(Instant::now());
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default answer".to_string()));
            let delay = self.delay;
            async move {
                tokio::time::sleep(delay).await;
                next
            }
        }
    }

    struct InFlightGenerator {
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Generator for InFlightGenerator {
        type Error = String;

        fn model(&self) -> &str {
            "in-flight"
        }

        fn generate(&self, _prompt: &Prompt) -> impl Future<Output = Result<String, String>> + Send {
            let current = Arc::clone(&self.current);
            let peak = Arc::clone(&self.peak);
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok("done".to_string())
            }
        }
    }

    fn prompt() -> Prompt {
        Prompt {
            system: "system".into(),
            user: "user".into(),
        }
    }

    fn policy(max_retries: u32, delay_base: f64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay_base,
            ..RetryPolicy::default()
        }
    }

    fn core<G: Generator + Sync>(generator: G, retry: RetryPolicy, min_delay: Duration) -> GenerationCore<G> {
        GenerationCore::new(generator, Arc::new(RateLimiter::new(4, min_delay)), retry)
    }

    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(50),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn backoff_grows_exponentially() {
        let retry = policy(3, 2.0);
        assert_eq!(retry.delay_before(0), Duration::ZERO);
        assert_eq!(retry.delay_before(1), Duration::from_secs(1));
        assert_eq!(retry.delay_before(2), Duration::from_secs(2));
        assert_eq!(retry.delay_before(3), Duration::from_secs(4));
        assert_eq!(policy(100, 10.0).delay_before(90), MAX_BACKOFF);
    }

    #[test]
    fn retryable_errors_are_matched_by_keyword() {
        let retry = RetryPolicy::default();
        assert!(retry.is_retryable("503 Service Unavailable"));
        assert!(retry.is_retryable("API error: 429 - Too Many Requests"));
        assert!(retry.is_retryable("RESOURCE_EXHAUSTED: quota exceeded"));
        assert!(retry.is_retryable("The model is overloaded"));
        assert!(retry.is_retryable("operation timed out"));
        assert!(!retry.is_retryable("API error: 401 - invalid api key"));
        assert!(!retry.is_retryable("model not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_with_backoff() {
        let generator = ScriptedGenerator::new(vec![
            Err("503 Service Unavailable"),
            Err("rate limit exceeded"),
            Ok("  Live now! #Rust #Coding #Linux  "),
        ]);
        let core = core(generator, policy(3, 2.0), Duration::ZERO);

        let text = core.generate(&prompt()).await;

        assert_eq!(text.as_deref(), Some("Live now! #Rust #Coding #Linux"));
        assert_eq!(core.generator().calls(), 3);
        let gaps = core.generator().gaps();
        assert_close(gaps[0], Duration::from_secs(1));
        assert_close(gaps[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_fails_after_one_call() {
        let generator = ScriptedGenerator::new(vec![Err("API error: 401 - invalid api key")]);
        let core = core(generator, policy(3, 2.0), Duration::ZERO);

        assert_eq!(core.generate(&prompt()).await, None);
        assert_eq!(core.generator().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let generator = ScriptedGenerator::new(vec![
            Err("overloaded"),
            Err("overloaded"),
            Err("overloaded"),
            Ok("too late"),
        ]);
        let core = core(generator, policy(2, 2.0), Duration::ZERO);

        assert_eq!(core.generate(&prompt()).await, None);
        assert_eq!(core.generator().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_answer_yields_none() {
        let generator = ScriptedGenerator::new(vec![Ok("   \n ")]);
        let core = core(generator, policy(3, 2.0), Duration::ZERO);

        assert_eq!(core.generate(&prompt()).await, None);
        assert_eq!(core.generator().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_spaced_by_min_delay() {
        let generator = ScriptedGenerator::new(vec![Ok("one"), Ok("two"), Ok("three")]);
        let core = core(generator, policy(0, 2.0), Duration::from_secs(2));

        for _ in 0..3 {
            assert!(core.generate(&prompt()).await.is_some());
        }

        for gap in core.generator().gaps() {
            assert!(gap >= Duration::from_secs(2), "gap {gap:?} below min delay");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out_and_are_retried() {
        let mut retry = policy(1, 2.0);
        retry.attempt_timeout = Some(Duration::from_secs(1));
        let core = core(
            ScriptedGenerator::slow(Duration::from_secs(10)),
            retry,
            Duration::ZERO,
        );

        assert_eq!(core.generate(&prompt()).await, None);
        assert_eq!(core.generator().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_are_capped() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let core = Arc::new(core(
            InFlightGenerator {
                current: Arc::clone(&current),
                peak: Arc::clone(&peak),
            },
            policy(0, 2.0),
            Duration::ZERO,
        ));

        let handles = (0..10)
            .map(|_| {
                let core = Arc::clone(&core);
                tokio::spawn(async move { core.generate(&prompt()).await })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            assert_eq!(handle.await.unwrap().as_deref(), Some("done"));
        }

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "{peak} calls in flight");
        assert!(peak > 1, "calls never overlapped");
        assert_eq!(core.limiter().available_slots(), 4);
    }
}
