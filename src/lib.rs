//! marketfit - Simulated Product-Market Fit Refinement
//!
//! Iteratively refines a product concept against a synthetic consumer
//! population. Free-text survey answers are turned into rating distributions
//! by semantic similarity rating (SSR), aggregated into a market fit score,
//! critiqued, and fed back into the next concept until the fit threshold or
//! the iteration budget is reached.
//!
//! ## Quick Start
//!
//! ```ignore
//! use marketfit::{AgentProviders, ConfigLoader, RefinementController, RunParameters};
//!
//! let config = ConfigLoader::load()?;
//! let providers = AgentProviders::from_config(&config, create_limiter(&config), CallMetrics::shared())?;
//! let controller = RefinementController::new(providers, scorer, Arc::new(TracingObserver));
//! let state = controller
//!     .run(&RunParameters::from_config(&config, "meal kits for students"), &cancel)
//!     .await?;
//! ```
//!
//! ## Modules
//!
//! - [`ssr`]: reference scales and the rating converter
//! - [`market`]: simulation, fit aggregation and decision tables
//! - [`population`]: quota-steered persona generation
//! - [`agents`]: concept ideation and critique
//! - [`workflow`]: the refinement state machine and progress events
//! - [`ai`]: completion/embedding providers, rate limiting, retry, metrics

pub mod agents;
pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod market;
pub mod population;
pub mod ssr;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod test_support;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader, DemographicsConfig};
pub use types::error::{ErrorCategory, LlmError, MarketError, Result};
pub use types::{CriticFeedback, Persona, PersonaResponse, ProductConcept};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use market::{FitAggregator, FitScorer, MarketFitScore, MarketSimulator, SsrFitScorer};
pub use population::{Population, PopulationReport, PopulationSampler};
pub use ssr::{Dimension, Pmf, RatingConverter, RatingScale};
pub use workflow::{
    AgentProviders, HistoryEntry, ProgressEvent, ProgressObserver, RefinementController,
    RunParameters, Stage, WorkflowState,
};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    CallMetrics, CompletionProvider, Embedder, OpenAiEmbedder, OpenAiProvider, SharedEmbedder,
    SharedMetrics, SharedProvider,
};
