//! AI Integration Layer
//!
//! Completion and embedding providers plus the plumbing around them:
//! rate limiting, retries, JSON repair, prompt construction, and call metrics.

pub mod embedding;
pub mod metrics;
pub mod prompt;
pub mod provider;
pub mod validation;

pub use embedding::{
    Embedder, OpenAiEmbedder, ResilientEmbedder, SharedEmbedder, cosine_similarity,
    create_embedder,
};
pub use metrics::{CallMetrics, MetricsSummary, OperationStats, SharedMetrics};
pub use prompt::{PromptBuilder, PromptSection};
pub use provider::{
    CompletionProvider, LlmResponse, OpenAiProvider, ProviderConfig, ResilientProvider,
    ResponseMetadata, RetryPolicy, SharedProvider, SlidingWindowLimiter, TextResponse,
    TokenUsage, create_limiter, create_provider, parse_content,
};
pub use validation::{JsonRepairer, extract_json_from_response, extract_record_array};
