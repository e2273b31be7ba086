//! Resilient provider wrapper
//!
//! Every call acquires the shared rate limiter, then runs under exponential
//! backoff with jitter. A provider's Retry-After hint stretches the wait.
//! Fatal errors (authentication) and non-provider failures are returned
//! immediately; exhaustion surfaces the last error.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{CompletionProvider, LlmResponse, SlidingWindowLimiter, TextResponse};
use crate::ai::metrics::SharedMetrics;
use crate::constants::api::MAX_RETRY_AFTER_SECS;
use crate::types::{MarketError, Result};

const OP_COMPLETE: &str = "complete";
const OP_COMPLETE_TEXT: &str = "complete_text";

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.saturating_sub(1))
            .with_jitter()
    }

    /// Backoff delay, or the provider's requested wait when that is longer
    pub(crate) fn delay_for(&self, err: &MarketError, backoff: Duration) -> Duration {
        match err.retry_after() {
            Some(hint) => backoff.max(hint.min(Duration::from_secs(MAX_RETRY_AFTER_SECS))),
            None => backoff,
        }
    }
}

pub struct ResilientProvider<P> {
    inner: P,
    limiter: Arc<SlidingWindowLimiter>,
    policy: RetryPolicy,
    metrics: SharedMetrics,
}

impl<P: CompletionProvider> ResilientProvider<P> {
    pub fn new(
        inner: P,
        limiter: Arc<SlidingWindowLimiter>,
        policy: RetryPolicy,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            inner,
            limiter,
            policy,
            metrics,
        }
    }

    fn on_retry(&self, operation: &str, err: &MarketError, delay: Duration) {
        self.metrics.record_retry(operation);
        warn!(
            provider = self.inner.name(),
            "{} failed ({}), retrying in {:?}", operation, err, delay
        );
    }

    fn finish<T>(
        &self,
        operation: &str,
        started: Instant,
        result: Result<T>,
        usage: impl FnOnce(&T) -> super::TokenUsage,
    ) -> Result<T> {
        match &result {
            Ok(value) => {
                self.metrics
                    .record_success(operation, &usage(value), started.elapsed());
                debug!(provider = self.inner.name(), "{} succeeded", operation);
            }
            Err(e) => {
                self.metrics.record_failure(operation);
                warn!(provider = self.inner.name(), "{} failed: {}", operation, e);
            }
        }
        result
    }
}

#[async_trait]
impl<P: CompletionProvider> CompletionProvider for ResilientProvider<P> {
    async fn complete(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        let started = Instant::now();
        let result = (|| async {
            self.limiter.acquire().await;
            self.inner.complete(prompt, schema).await
        })
        .retry(self.policy.backoff())
        .sleep(tokio::time::sleep)
        .when(|e: &MarketError| e.is_retryable())
        .adjust(|e: &MarketError, backoff: Option<Duration>| {
            backoff.map(|d| self.policy.delay_for(e, d))
        })
        .notify(|e: &MarketError, delay: Duration| self.on_retry(OP_COMPLETE, e, delay))
        .await;

        self.finish(OP_COMPLETE, started, result, |r| r.usage)
    }

    async fn complete_text(&self, prompt: &str) -> Result<TextResponse> {
        let started = Instant::now();
        let result = (|| async {
            self.limiter.acquire().await;
            self.inner.complete_text(prompt).await
        })
        .retry(self.policy.backoff())
        .sleep(tokio::time::sleep)
        .when(|e: &MarketError| e.is_retryable())
        .adjust(|e: &MarketError, backoff: Option<Duration>| {
            backoff.map(|d| self.policy.delay_for(e, d))
        })
        .notify(|e: &MarketError, delay: Duration| self.on_retry(OP_COMPLETE_TEXT, e, delay))
        .await;

        self.finish(OP_COMPLETE_TEXT, started, result, |r| r.usage)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::metrics::CallMetrics;
    use crate::types::{ErrorCategory, LlmError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with `category` for the first `failures` calls
    struct Flaky {
        failures: usize,
        category: ErrorCategory,
        retry_after: Option<Duration>,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn new(failures: usize, category: ErrorCategory) -> Self {
            Self {
                failures,
                category,
                retry_after: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn with_retry_after(mut self, wait: Duration) -> Self {
            self.retry_after = Some(wait);
            self
        }

        fn attempt(&self) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                let mut err = LlmError::with_provider(self.category, "boom", "flaky");
                if let Some(wait) = self.retry_after {
                    err = err.retry_after(wait);
                }
                Err(err.into())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for Flaky {
        async fn complete(&self, _prompt: &str, _schema: &Value) -> Result<LlmResponse> {
            self.attempt()
                .map(|_| LlmResponse::content_only(json!({"ok": true})))
        }

        async fn complete_text(&self, _prompt: &str) -> Result<TextResponse> {
            self.attempt().map(|_| TextResponse::text_only("ok"))
        }

        fn name(&self) -> &str {
            "flaky"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    fn wrap(inner: Flaky, attempts: usize) -> (ResilientProvider<Flaky>, SharedMetrics) {
        let metrics = CallMetrics::shared();
        let provider = ResilientProvider::new(
            inner,
            Arc::new(SlidingWindowLimiter::new(100, Duration::from_secs(60))),
            RetryPolicy {
                max_attempts: attempts,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
            },
            Arc::clone(&metrics),
        );
        (provider, metrics)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors() {
        let (provider, metrics) = wrap(Flaky::new(2, ErrorCategory::RateLimit), 3);
        let response = provider.complete("p", &json!({})).await.unwrap();
        assert_eq!(response.content["ok"], true);
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 3);

        let stats = metrics.operation("complete").unwrap();
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_retry_after_hint() {
        let flaky = Flaky::new(1, ErrorCategory::RateLimit).with_retry_after(Duration::from_secs(30));
        let (provider, _) = wrap(flaky, 3);

        let start = tokio::time::Instant::now();
        provider.complete("p", &json!({})).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_is_capped() {
        let flaky = Flaky::new(1, ErrorCategory::RateLimit).with_retry_after(Duration::from_secs(3600));
        let (provider, _) = wrap(flaky, 3);

        let start = tokio::time::Instant::now();
        provider.complete_text("p").await.unwrap();
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(MAX_RETRY_AFTER_SECS));
        assert!(waited < Duration::from_secs(MAX_RETRY_AFTER_SECS + 1));
    }

    #[test]
    fn test_delay_for_keeps_longer_backoff() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        let hinted: MarketError = LlmError::new(ErrorCategory::RateLimit, "slow down")
            .retry_after(Duration::from_secs(2))
            .into();
        assert_eq!(policy.delay_for(&hinted, Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(policy.delay_for(&hinted, Duration::from_secs(1)), Duration::from_secs(2));

        let plain: MarketError = LlmError::new(ErrorCategory::Network, "reset").into();
        assert_eq!(policy.delay_for(&plain, Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_is_not_retried() {
        let (provider, metrics) = wrap(Flaky::new(5, ErrorCategory::Auth), 3);
        let err = provider.complete_text("p").await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.operation("complete_text").unwrap().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_surfaces_last_error() {
        let (provider, _) = wrap(Flaky::new(10, ErrorCategory::Unavailable), 3);
        let err = provider.complete("p", &json!({})).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unavailable);
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy() {
        let (provider, _) = wrap(Flaky::new(1, ErrorCategory::Transient), 1);
        assert!(provider.complete_text("p").await.is_err());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }
}
