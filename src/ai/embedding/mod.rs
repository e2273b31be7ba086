//! Embedding capability
//!
//! Text → vector, used only by the rating converter. `OpenAiEmbedder` makes
//! the raw HTTP call; `ResilientEmbedder` puts it behind the shared rate
//! limiter and the same retry policy as completion calls.

use async_trait::async_trait;
use backon::Retryable;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::ai::metrics::SharedMetrics;
use crate::ai::provider::{ErrorClassifier, RetryPolicy, SlidingWindowLimiter};
use crate::config::{Config, EmbeddingConfig};
use crate::types::{ErrorCategory, LlmError, MarketError, Result};

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

pub type SharedEmbedder = Arc<dyn Embedder>;

/// Cosine similarity; zero when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

// =============================================================================
// OpenAI-compatible Embedder
// =============================================================================

const PROVIDER: &str = "embeddings";

pub struct OpenAiEmbedder {
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            MarketError::Config(format!(
                "Embedding API key not found. Set {} or OPENAI_API_KEY",
                config.api_key_env
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MarketError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&EmbeddingRequest {
                model: &self.model,
                input,
            })
            .send()
            .await
            .map_err(|e| {
                MarketError::from(ErrorClassifier::classify(
                    &format!("Embedding request failed: {}", e),
                    PROVIDER,
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            let mut err = ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("HTTP {}: {}", status, body),
                PROVIDER,
            );
            if let Some(delay) = retry_after {
                err = err.retry_after(delay);
            }
            return Err(err.into());
        }

        let mut body: EmbeddingResponse = response.json().await.map_err(|e| {
            LlmError::with_provider(
                ErrorCategory::ParseError,
                format!("Failed to parse embedding body: {}", e),
                PROVIDER,
            )
        })?;
        if body.data.len() != input.len() {
            return Err(LlmError::with_provider(
                ErrorCategory::ParseError,
                format!("Expected {} embeddings, got {}", input.len(), body.data.len()),
                PROVIDER,
            )
            .into());
        }
        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            LlmError::with_provider(ErrorCategory::ParseError, "Empty embedding response", PROVIDER)
                .into()
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

// =============================================================================
// Rate limiting + retry
// =============================================================================

const OP_EMBED: &str = "embed";

/// Wraps any embedder with the shared limiter, backoff and call metrics.
/// One limiter acquisition per request, including each retry.
pub struct ResilientEmbedder<E> {
    inner: E,
    limiter: Arc<SlidingWindowLimiter>,
    policy: RetryPolicy,
    metrics: SharedMetrics,
}

impl<E: Embedder> ResilientEmbedder<E> {
    pub fn new(
        inner: E,
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
}

#[async_trait]
impl<E: Embedder> Embedder for ResilientEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            LlmError::with_provider(ErrorCategory::ParseError, "Empty embedding response", PROVIDER)
                .into()
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let result = (|| async {
            self.limiter.acquire().await;
            self.inner.embed_batch(texts).await
        })
        .retry(self.policy.backoff())
        .sleep(tokio::time::sleep)
        .when(|e: &MarketError| e.is_retryable())
        .adjust(|e: &MarketError, backoff: Option<Duration>| {
            backoff.map(|d| self.policy.delay_for(e, d))
        })
        .notify(|e: &MarketError, delay: Duration| {
            self.metrics.record_retry(OP_EMBED);
            warn!("Embedding failed ({}), retrying in {:?}", e, delay);
        })
        .await;

        match result {
            Ok(vectors) => {
                self.metrics
                    .record_success(OP_EMBED, &Default::default(), started.elapsed());
                Ok(vectors)
            }
            Err(e) => {
                self.metrics.record_failure(OP_EMBED);
                Err(e)
            }
        }
    }
}

/// HTTP embedder behind `limiter`, retried per the `[api]` section
pub fn create_embedder(
    config: &Config,
    limiter: Arc<SlidingWindowLimiter>,
    metrics: SharedMetrics,
) -> Result<SharedEmbedder> {
    let inner = OpenAiEmbedder::new(&config.embedding)?;
    Ok(Arc::new(ResilientEmbedder::new(
        inner,
        limiter,
        RetryPolicy::from_config(config),
        metrics,
    )))
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
