//! OpenAI-compatible Chat Completions Provider
//!
//! Works against OpenRouter (default) or any endpoint speaking the OpenAI
//! chat completions protocol. Returns token usage for metrics.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{
    CompletionProvider, ErrorClassifier, LlmResponse, ProviderConfig, ResponseMetadata,
    TextResponse, TokenUsage,
};
use crate::ai::validation::extract_json_from_response;
use crate::types::{ErrorCategory, LlmError, MarketError, Result};

/// OpenAI-compatible provider with secure API key handling
pub struct OpenAiProvider {
    /// Never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    name: &'static str,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config.api_key.ok_or_else(|| {
            MarketError::Config(
                "API key not found. Set OPENROUTER_API_KEY or OPENAI_API_KEY".to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MarketError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        let name = if config.api_base.contains("openrouter") {
            "openrouter"
        } else {
            "openai"
        };

        Ok(Self {
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            name,
            client,
        })
    }

    fn build_request(&self, prompt: &str, schema: Option<&Value>) -> ChatCompletionRequest {
        let (system, response_format) = match schema {
            Some(schema) => (
                format!(
                    "Always respond with valid JSON matching this schema:\n\n```json\n{}\n```\n\nRespond ONLY with JSON, no explanation.",
                    serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
                ),
                Some(ResponseFormat {
                    format_type: "json_object".to_string(),
                }),
            ),
            None => ("Respond in plain prose.".to_string(), None),
        };

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            response_format,
        }
    }

    /// POST the request and return the first choice's text plus usage
    async fn send(&self, request: &ChatCompletionRequest) -> Result<(String, TokenUsage)> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

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
                self.name,
            );
            if let Some(delay) = retry_after {
                err = err.retry_after(delay);
            }
            return Err(err.into());
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            LlmError::with_provider(
                ErrorCategory::ParseError,
                format!("Failed to parse completion body: {}", e),
                self.name,
            )
        })?;

        let usage = body
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                LlmError::with_provider(
                    ErrorCategory::Transient,
                    "Completion contained no content",
                    self.name,
                )
            })?;

        Ok((text, usage))
    }

    fn transport_error(&self, e: reqwest::Error) -> MarketError {
        let category = if e.is_timeout() || e.is_connect() {
            ErrorCategory::Network
        } else {
            ErrorClassifier::classify(&e.to_string(), self.name).category
        };
        LlmError::with_provider(category, format!("Request failed: {}", e), self.name).into()
    }

    fn metadata(&self) -> ResponseMetadata {
        ResponseMetadata {
            model: self.model.clone(),
            provider: self.name.to_string(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    #[instrument(skip_all, fields(provider = self.name, model = %self.model))]
    async fn complete(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        let request = self.build_request(prompt, Some(schema));
        let (text, usage) = self.send(&request).await?;

        debug!("Received completion, parsing JSON");
        let content = extract_json_from_response(&text)?;

        Ok(LlmResponse {
            content,
            usage,
            metadata: self.metadata(),
        })
    }

    #[instrument(skip_all, fields(provider = self.name, model = %self.model))]
    async fn complete_text(&self, prompt: &str) -> Result<TextResponse> {
        let request = self.build_request(prompt, None);
        let (text, usage) = self.send(&request).await?;
        Ok(TextResponse { text, usage })
    }

    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(api_base: &str) -> OpenAiProvider {
        OpenAiProvider::new(ProviderConfig {
            model: "openai/gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 30,
            api_base: api_base.into(),
            api_key: Some(SecretString::from("sk-test".to_string())),
        })
        .unwrap()
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = OpenAiProvider::new(ProviderConfig {
            model: "m".into(),
            temperature: 0.0,
            max_tokens: 10,
            timeout_secs: 5,
            api_base: "https://openrouter.ai/api/v1".into(),
            api_key: None,
        });
        assert!(matches!(result, Err(MarketError::Config(_))));
    }

    #[test]
    fn test_structured_request_requests_json() {
        let p = provider("https://openrouter.ai/api/v1/");
        assert_eq!(p.name(), "openrouter");
        let request = p.build_request("hi", Some(&json!({"title": "ProductConcept"})));
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(
            body["messages"][0]["content"]
                .as_str()
                .unwrap()
                .contains("ProductConcept")
        );
        assert_eq!(p.api_base, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_text_request_has_no_format() {
        let p = provider("https://api.openai.com/v1");
        assert_eq!(p.name(), "openai");
        let body = serde_json::to_value(p.build_request("hi", None)).unwrap();
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", provider("https://api.openai.com/v1"));
        assert!(!debug.contains("sk-test"));
    }
}
