//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Provides error classification for retry decisions around provider calls.
//!
//! ## Error Categories
//!
//! - **RateLimit**: Provider throttling (wait and retry)
//! - **Auth**: Authentication failures (fatal, never retried)
//! - **Network**: Connectivity issues and timeouts (retry with backoff)
//! - **Unavailable**: Model or provider unavailable (retry with backoff)
//! - **Transient**: Temporary server-side issues (retry)
//!
//! Every category except `Auth` is retried by the resilient provider.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Provider error categories used for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Authentication failed - fatal
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Model or provider unavailable
    Unavailable,
    /// Invalid request
    BadRequest,
    /// Response could not be parsed into the requested shape
    ParseError,
    /// Temporary server issues
    Transient,
    /// Unknown error - conservative retry
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Authentication failures abort the run; everything else is retriable
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth)
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Provider error with category, context, and retry hints
#[derive(Debug, Clone)]
pub struct LlmError {
    /// Error category for routing decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (if applicable)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.category.is_fatal()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps provider signals (HTTP status, error text) onto categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30));
        }

        if lower.contains("auth")
            || lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("invalid key")
            || lower.contains("unauthorized")
        {
            return LlmError::with_provider(ErrorCategory::Auth, message, provider);
        }

        if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("timeout")
            || lower.contains("timed out")
        {
            return LlmError::with_provider(ErrorCategory::Network, message, provider)
                .retry_after(Duration::from_secs(5));
        }

        if lower.contains("503")
            || lower.contains("502")
            || lower.contains("service unavailable")
            || lower.contains("model not found")
            || lower.contains("no endpoints")
            || lower.contains("overloaded")
        {
            return LlmError::with_provider(ErrorCategory::Unavailable, message, provider);
        }

        if lower.contains("parse")
            || lower.contains("json")
            || lower.contains("unexpected token")
        {
            return LlmError::with_provider(ErrorCategory::ParseError, message, provider)
                .retry_after(Duration::from_secs(1));
        }

        if lower.contains("400") || lower.contains("bad request") || lower.contains("malformed") {
            return LlmError::with_provider(ErrorCategory::BadRequest, message, provider);
        }

        if lower.contains("500") || lower.contains("temporary") || lower.contains("retry") {
            return LlmError::with_provider(ErrorCategory::Transient, message, provider)
                .retry_after(Duration::from_secs(2));
        }

        LlmError::with_provider(ErrorCategory::Unknown, message, provider)
    }

    /// Classify HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        match status {
            429 => LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30)),
            401 | 403 => LlmError::with_provider(ErrorCategory::Auth, message, provider),
            400 | 422 => LlmError::with_provider(ErrorCategory::BadRequest, message, provider),
            404 | 502 | 503 => {
                LlmError::with_provider(ErrorCategory::Unavailable, message, provider)
                    .retry_after(Duration::from_secs(5))
            }
            500 | 504 => LlmError::with_provider(ErrorCategory::Transient, message, provider)
                .retry_after(Duration::from_secs(5)),
            _ => LlmError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum MarketError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Provider Errors
    // -------------------------------------------------------------------------
    /// Structured provider error with category and retry hints
    #[error("LLM error: {0}")]
    Llm(LlmError),

    /// Simple provider error without a category (classified on demand)
    #[error("LLM API error: {0}")]
    LlmApi(String),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Rating conversion failed for {dimension}: {reason}")]
    RatingConversion { dimension: String, reason: String },

    #[error("Insufficient data: required at least {required} responses, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Persona generation failed: {0}")]
    PersonaGeneration(String),

    #[error("Invalid {kind} record: {reason}")]
    InvalidRecord { kind: &'static str, reason: String },

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl From<LlmError> for MarketError {
    fn from(err: LlmError) -> Self {
        MarketError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl MarketError {
    pub fn rating(dimension: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RatingConversion {
            dimension: dimension.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_record(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            kind,
            reason: reason.into(),
        }
    }

    /// Wait requested by the provider before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Llm(e) => e.retry_after,
            _ => None,
        }
    }

    /// Category of a provider-facing error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Llm(e) => e.category,
            Self::LlmApi(msg) => ErrorClassifier::classify(msg, "unknown").category,
            Self::Json(_) | Self::InvalidRecord { .. } => ErrorCategory::ParseError,
            Self::Io(_) => ErrorCategory::Network,
            Self::Config(_) => ErrorCategory::BadRequest,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Errors that must abort the run instead of being retried or skipped
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Llm(_) | Self::LlmApi(_) => self.category().is_fatal(),
            Self::Config(_) | Self::Cancelled(_) | Self::InsufficientData { .. } => true,
            _ => false,
        }
    }

    /// Whether a provider call failing with this error may be attempted again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Cancelled(_) | Self::InsufficientData { .. } => false,
            _ => !self.category().is_fatal(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
