//! Completion Provider Abstraction
//!
//! Defines the `CompletionProvider` trait every agent talks to.
//!
//! ## Modules
//!
//! - `openai`: OpenAI-compatible chat completions over HTTP (OpenRouter by default)
//! - `rate_limiter`: sliding-window limiter shared by all workers
//! - `resilient`: rate limiting + exponential backoff retry around any provider

mod openai;
mod rate_limiter;
mod resilient;

pub use openai::OpenAiProvider;
pub use rate_limiter::SlidingWindowLimiter;
pub use resilient::{ResilientProvider, RetryPolicy};

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::ai::metrics::SharedMetrics;
use crate::config::{AgentRole, Config};
use crate::types::{MarketError, Result};

// =============================================================================
// Responses with Usage Metrics
// =============================================================================

/// Structured completion plus usage
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Parsed JSON content
    pub content: Value,
    pub usage: TokenUsage,
    pub metadata: ResponseMetadata,
}

impl LlmResponse {
    /// Response with content only (usage unknown)
    pub fn content_only(content: Value) -> Self {
        Self {
            content,
            usage: TokenUsage::default(),
            metadata: ResponseMetadata::default(),
        }
    }
}

/// Free-text completion plus usage
#[derive(Debug, Clone)]
pub struct TextResponse {
    pub text: String,
    pub usage: TokenUsage,
}

impl TextResponse {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    pub model: String,
    pub provider: String,
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Settings for one provider instance.
///
/// The API key lives in a `SecretString`; Debug output redacts it.
#[derive(Clone)]
pub struct ProviderConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
    pub api_base: String,
    pub api_key: Option<SecretString>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ProviderConfig {
    /// Provider settings for one agent role
    pub fn for_role(config: &Config, role: AgentRole) -> Self {
        let agent = config.llm.agent(role);
        Self {
            model: agent.model.clone(),
            temperature: agent.temperature,
            max_tokens: config.llm.max_tokens,
            timeout_secs: config.llm.timeout_secs,
            api_base: config.llm.api_base.clone(),
            api_key: config.llm.api_key(),
        }
    }
}

// =============================================================================
// Completion Provider Trait
// =============================================================================

/// The external text-generation capability.
///
/// Errors are `MarketError::Llm` carrying an `ErrorCategory`; only `Auth`
/// is fatal, every other category may be retried.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate JSON conforming to `schema`
    async fn complete(&self, prompt: &str, schema: &Value) -> Result<LlmResponse>;

    /// Generate free text
    async fn complete_text(&self, prompt: &str) -> Result<TextResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model currently in use
    fn model(&self) -> &str;
}

/// Shared provider for concurrent access across workflow stages
pub type SharedProvider = Arc<dyn CompletionProvider>;

/// Parse a structured completion into a typed record
pub fn parse_content<T: serde::de::DeserializeOwned>(
    response: &LlmResponse,
    provider: &str,
) -> Result<T> {
    serde_json::from_value(response.content.clone()).map_err(|e| {
        MarketError::Llm(LlmError::with_provider(
            ErrorCategory::ParseError,
            format!("Response does not match schema: {}", e),
            provider,
        ))
    })
}

/// Build the resilient HTTP provider for an agent role.
///
/// Every provider built from the same `limiter` shares one call budget.
pub fn create_provider(
    config: &Config,
    role: AgentRole,
    limiter: Arc<SlidingWindowLimiter>,
    metrics: SharedMetrics,
) -> Result<SharedProvider> {
    let inner = OpenAiProvider::new(ProviderConfig::for_role(config, role))?;
    let policy = RetryPolicy::from_config(config);
    Ok(Arc::new(ResilientProvider::new(
        inner, limiter, policy, metrics,
    )))
}

impl RetryPolicy {
    /// Policy from the `[api]` section
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.api.retry_attempts,
            base_delay: Duration::from_millis(config.api.retry_base_delay_ms),
            max_delay: Duration::from_secs(crate::constants::api::MAX_RETRY_DELAY_SECS),
        }
    }
}

/// Limiter sized from the `[api]` section
pub fn create_limiter(config: &Config) -> Arc<SlidingWindowLimiter> {
    Arc::new(SlidingWindowLimiter::new(
        config.api.rate_limit_calls,
        Duration::from_secs(config.api.rate_limit_period_secs),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_content_mismatch_is_parse_error() {
        #[derive(Debug, Deserialize)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }
        let response = LlmResponse::content_only(json!({"title": 3}));
        let err = parse_content::<Named>(&response, "mock").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ParseError);
    }

    #[test]
    fn test_provider_config_redacts_key() {
        let mut config = ProviderConfig::for_role(&Config::default(), AgentRole::Simulator);
        config.api_key = Some(SecretString::from("sk-secret".to_string()));
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-secret"));
        assert_eq!(config.temperature, 0.7);
    }
}
