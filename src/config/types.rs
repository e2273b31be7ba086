//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global and project (.marketfit/) level configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{api, network, population, ssr, workflow};
use crate::types::{MarketError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Refinement loop settings
    pub workflow: WorkflowConfig,

    /// Completion provider settings
    pub llm: LlmConfig,

    /// Rate limiting and retry settings shared by every provider call
    pub api: ApiConfig,

    /// Embedding provider settings
    pub embedding: EmbeddingConfig,

    /// Semantic similarity rating parameters
    pub ssr: SsrConfig,

    /// Target population mix
    pub demographics: DemographicsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            workflow: WorkflowConfig::default(),
            llm: LlmConfig::default(),
            api: ApiConfig::default(),
            embedding: EmbeddingConfig::default(),
            ssr: SsrConfig::default(),
            demographics: DemographicsConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `MarketError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        let wf = &self.workflow;
        if wf.max_iterations == 0 {
            return Err(MarketError::Config(
                "workflow.max_iterations must be at least 1".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&wf.fit_threshold) {
            return Err(MarketError::Config(format!(
                "workflow.fit_threshold must be between 0 and 100, got {}",
                wf.fit_threshold
            )));
        }
        if wf.population_size < population::MIN_POPULATION_SIZE {
            return Err(MarketError::Config(format!(
                "workflow.population_size must be at least {}, got {}",
                population::MIN_POPULATION_SIZE,
                wf.population_size
            )));
        }
        if wf.simulation_concurrency == 0 {
            return Err(MarketError::Config(
                "workflow.simulation_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.api.rate_limit_calls == 0 || self.api.rate_limit_period_secs == 0 {
            return Err(MarketError::Config(
                "api.rate_limit_calls and api.rate_limit_period_secs must be greater than 0"
                    .to_string(),
            ));
        }
        if self.api.retry_attempts == 0 {
            return Err(MarketError::Config(
                "api.retry_attempts must be at least 1".to_string(),
            ));
        }

        if self.ssr.temperature <= 0.0 {
            return Err(MarketError::Config(format!(
                "ssr.temperature must be greater than 0, got {}",
                self.ssr.temperature
            )));
        }
        if !(0.0..1.0).contains(&self.ssr.epsilon) {
            return Err(MarketError::Config(format!(
                "ssr.epsilon must be in [0, 1), got {}",
                self.ssr.epsilon
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(MarketError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }
        for (role, agent) in self.llm.agents() {
            if !(0.0..=2.0).contains(&agent.temperature) {
                return Err(MarketError::Config(format!(
                    "llm.{}.temperature must be between 0.0 and 2.0, got {}",
                    role, agent.temperature
                )));
            }
            if agent.model.trim().is_empty() {
                return Err(MarketError::Config(format!("llm.{}.model is empty", role)));
            }
        }

        for (name, base) in [
            ("llm.api_base", &self.llm.api_base),
            ("embedding.api_base", &self.embedding.api_base),
        ] {
            url::Url::parse(base).map_err(|e| {
                MarketError::Config(format!("{} is not a valid URL ({}): {}", name, base, e))
            })?;
        }

        self.demographics.validate()
    }
}

// =============================================================================
// Workflow Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Iteration budget
    pub max_iterations: usize,

    /// Fit percentage at which refinement stops
    pub fit_threshold: f64,

    /// Synthetic respondents generated once per run
    pub population_size: usize,

    /// Concurrent persona simulations
    pub simulation_concurrency: usize,

    /// Raw responses shown to the critic
    pub feedback_samples: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: workflow::DEFAULT_MAX_ITERATIONS,
            fit_threshold: workflow::DEFAULT_FIT_THRESHOLD,
            population_size: workflow::DEFAULT_POPULATION_SIZE,
            simulation_concurrency: workflow::DEFAULT_SIMULATION_CONCURRENCY,
            feedback_samples: workflow::DEFAULT_FEEDBACK_SAMPLES,
        }
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// Which agent a provider is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Ideator,
    PersonaGenerator,
    Simulator,
    Critic,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Ideator => write!(f, "ideator"),
            AgentRole::PersonaGenerator => write!(f, "persona_generator"),
            AgentRole::Simulator => write!(f, "simulator"),
            AgentRole::Critic => write!(f, "critic"),
        }
    }
}

/// Model and sampling settings for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentModelConfig {
    pub model: String,
    pub temperature: f32,
}

impl AgentModelConfig {
    fn new(model: &str, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint (OpenRouter by default)
    pub api_base: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    pub ideator: AgentModelConfig,
    pub persona_generator: AgentModelConfig,
    pub simulator: AgentModelConfig,
    pub critic: AgentModelConfig,

    /// Maximum tokens to generate per call
    pub max_tokens: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            ideator: AgentModelConfig::new("anthropic/claude-sonnet-4", 0.9),
            persona_generator: AgentModelConfig::new("openai/gpt-4o-mini", 0.9),
            simulator: AgentModelConfig::new("openai/gpt-4o-mini", 0.7),
            critic: AgentModelConfig::new("anthropic/claude-sonnet-4", 0.5),
            max_tokens: network::DEFAULT_MAX_TOKENS,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LlmConfig {
    pub fn agent(&self, role: AgentRole) -> &AgentModelConfig {
        match role {
            AgentRole::Ideator => &self.ideator,
            AgentRole::PersonaGenerator => &self.persona_generator,
            AgentRole::Simulator => &self.simulator,
            AgentRole::Critic => &self.critic,
        }
    }

    fn agents(&self) -> [(AgentRole, &AgentModelConfig); 4] {
        [
            (AgentRole::Ideator, &self.ideator),
            (AgentRole::PersonaGenerator, &self.persona_generator),
            (AgentRole::Simulator, &self.simulator),
            (AgentRole::Critic, &self.critic),
        ]
    }

    /// Resolve the API key: configured variable first, then the OpenAI one
    pub fn api_key(&self) -> Option<SecretString> {
        resolve_key(&[self.api_key_env.as_str(), "OPENROUTER_API_KEY", "OPENAI_API_KEY"])
    }
}

fn resolve_key(vars: &[&str]) -> Option<SecretString> {
    vars.iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
        .map(SecretString::from)
}

// =============================================================================
// API Resilience Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Calls allowed per rolling window, shared by all workers
    pub rate_limit_calls: usize,

    /// Rolling window length in seconds
    pub rate_limit_period_secs: u64,

    /// Total attempts per call (1 = no retry)
    pub retry_attempts: usize,

    /// Base delay for exponential backoff
    pub retry_base_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rate_limit_calls: api::DEFAULT_RATE_LIMIT_CALLS,
            rate_limit_period_secs: api::DEFAULT_RATE_LIMIT_PERIOD_SECS,
            retry_attempts: api::DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay_ms: api::DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

// =============================================================================
// Embedding Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub api_base: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    pub fn api_key(&self) -> Option<SecretString> {
        resolve_key(&[self.api_key_env.as_str(), "OPENAI_API_KEY"])
    }
}

// =============================================================================
// SSR Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrConfig {
    /// Softmax temperature over reference similarities
    pub temperature: f64,

    /// Uniform mass blended into every PMF
    pub epsilon: f64,
}

impl Default for SsrConfig {
    fn default() -> Self {
        Self {
            temperature: ssr::DEFAULT_TEMPERATURE,
            epsilon: ssr::DEFAULT_EPSILON,
        }
    }
}

// =============================================================================
// Demographics Configuration
// =============================================================================

/// Target percentage per bucket, keyed by bucket label.
/// An empty or all-zero map disables quotas for that facet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographicsConfig {
    /// Keys: 18-24, 25-34, 35-44, 45-54, 55-64, 65+
    pub age: BTreeMap<String, f64>,

    /// Keys: low, lower-middle, middle, upper-middle, high
    pub income: BTreeMap<String, f64>,

    /// Keys: urban, suburban, rural
    pub location: BTreeMap<String, f64>,

    /// Keys: 1 through 5
    pub tech_savviness: BTreeMap<String, f64>,
}

fn pct_map(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), *v))
        .collect()
}

impl Default for DemographicsConfig {
    fn default() -> Self {
        Self {
            age: pct_map(&[
                ("18-24", 15.0),
                ("25-34", 25.0),
                ("35-44", 22.0),
                ("45-54", 18.0),
                ("55-64", 12.0),
                ("65+", 8.0),
            ]),
            income: pct_map(&[
                ("low", 15.0),
                ("lower-middle", 25.0),
                ("middle", 30.0),
                ("upper-middle", 20.0),
                ("high", 10.0),
            ]),
            location: pct_map(&[("urban", 45.0), ("suburban", 40.0), ("rural", 15.0)]),
            tech_savviness: pct_map(&[
                ("1", 5.0),
                ("2", 15.0),
                ("3", 35.0),
                ("4", 30.0),
                ("5", 15.0),
            ]),
        }
    }
}

impl DemographicsConfig {
    /// Demographics with every facet unconstrained
    pub fn unconstrained() -> Self {
        Self {
            age: BTreeMap::new(),
            income: BTreeMap::new(),
            location: BTreeMap::new(),
            tech_savviness: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (facet, map) in [
            ("age", &self.age),
            ("income", &self.income),
            ("location", &self.location),
            ("tech_savviness", &self.tech_savviness),
        ] {
            for (bucket, pct) in map {
                if !pct.is_finite() || *pct < 0.0 {
                    return Err(MarketError::Config(format!(
                        "demographics.{}.{} must be a non-negative percentage, got {}",
                        facet, bucket, pct
                    )));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.workflow.max_iterations, 5);
        assert_eq!(config.workflow.fit_threshold, 40.0);
        assert_eq!(config.api.rate_limit_calls, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_small_population() {
        let mut config = Config::default();
        config.workflow.population_size = 5;
        assert!(matches!(config.validate(), Err(MarketError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_ssr_parameters() {
        let mut config = Config::default();
        config.ssr.temperature = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ssr.epsilon = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_percentage() {
        let mut config = Config::default();
        config.demographics.age.insert("18-24".into(), -5.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_url() {
        let mut config = Config::default();
        config.llm.api_base = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_agent_lookup() {
        let llm = LlmConfig::default();
        assert_eq!(llm.agent(AgentRole::Critic).temperature, 0.5);
        assert_eq!(AgentRole::PersonaGenerator.to_string(), "persona_generator");
    }
}
