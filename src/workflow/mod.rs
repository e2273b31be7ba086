//! Refinement Controller
//!
//! ```text
//! PopulateOnce → Ideate → Simulate → Score → Critique → Decide ─┬→ Finalize
//!                  ↑                                              │
//!                  └──────────────────────────────────────────────┘
//! ```
//!
//! The population is generated once and reused by every iteration so that
//! scores are comparable across iterations. Unrecoverable errors propagate
//! out of the run; the state machine has no failure state.

pub mod progress;

pub use progress::{
    BroadcastObserver, ProgressEvent, ProgressObserver, SharedObserver, TracingObserver,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::agents::{Critic, Ideator};
use crate::ai::metrics::SharedMetrics;
use crate::ai::provider::{SharedProvider, SlidingWindowLimiter, create_provider};
use crate::config::{AgentRole, Config, DemographicsConfig};
use crate::constants::population::MIN_POPULATION_SIZE;
use crate::market::{
    FitScorer, MarketFitScore, MarketSimulator, ScoredResponses, render_feedback_sample, select_feedback_sample,
};
use crate::population::{PopulationReport, PopulationSampler};
use crate::types::{
    CriticFeedback, MarketError, Persona, PersonaResponse, ProductConcept, Result,
};

// =============================================================================
// States
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PopulateOnce,
    Ideate,
    Simulate,
    Score,
    Critique,
    Decide,
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PopulateOnce => "populate",
            Self::Ideate => "ideate",
            Self::Simulate => "simulate",
            Self::Score => "score",
            Self::Critique => "critique",
            Self::Decide => "decide",
            Self::Finalize => "finalize",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact per-iteration summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub iteration: usize,
    pub concept_name: String,
    pub fit_score: f64,
    pub nps: i32,
    pub avg_interest: f64,
}

/// Everything the controller knows about a run
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stage: Stage,
    /// Completed ideation steps; only ever increases
    pub iteration: usize,
    pub max_iterations: usize,
    pub fit_threshold: f64,
    pub population_size: usize,
    /// Latest concept that has been scored; always matches `score`
    pub concept: Option<ProductConcept>,
    /// Concept ideated this iteration, promoted to `concept` once scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_concept: Option<ProductConcept>,
    #[serde(serialize_with = "serialize_population")]
    pub population: Arc<Vec<Persona>>,
    pub population_report: Option<PopulationReport>,
    /// Responses of the latest completed simulation
    pub responses: Vec<PersonaResponse>,
    pub score: Option<MarketFitScore>,
    pub feedback: Option<CriticFeedback>,
    pub history: Vec<HistoryEntry>,
    pub should_continue: bool,
}

fn serialize_population<S: serde::Serializer>(
    population: &Arc<Vec<Persona>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    population.as_slice().serialize(serializer)
}

impl WorkflowState {
    pub fn new(params: &RunParameters) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            stage: Stage::PopulateOnce,
            iteration: 0,
            max_iterations: params.max_iterations,
            fit_threshold: params.fit_threshold,
            population_size: params.population_size,
            concept: None,
            candidate_concept: None,
            population: Arc::new(Vec::new()),
            population_report: None,
            responses: Vec::new(),
            score: None,
            feedback: None,
            history: Vec::new(),
            should_continue: true,
        }
    }

    pub fn met_threshold(&self) -> bool {
        self.score
            .as_ref()
            .is_some_and(|s| s.meets_threshold(self.fit_threshold))
    }

    /// Iteration with the highest fit score
    pub fn best_iteration(&self) -> Option<&HistoryEntry> {
        self.history
            .iter()
            .max_by(|a, b| a.fit_score.total_cmp(&b.fit_score))
    }
}

// =============================================================================
// Parameters
// =============================================================================

#[derive(Debug, Clone)]
pub struct RunParameters {
    pub seed_idea: String,
    pub max_iterations: usize,
    pub fit_threshold: f64,
    pub population_size: usize,
    pub simulation_concurrency: usize,
    pub feedback_samples: usize,
    pub demographics: DemographicsConfig,
}

impl RunParameters {
    pub fn from_config(config: &Config, seed_idea: impl Into<String>) -> Self {
        Self {
            seed_idea: seed_idea.into(),
            max_iterations: config.workflow.max_iterations,
            fit_threshold: config.workflow.fit_threshold,
            population_size: config.workflow.population_size,
            simulation_concurrency: config.workflow.simulation_concurrency,
            feedback_samples: config.workflow.feedback_samples,
            demographics: config.demographics.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.seed_idea.trim().is_empty() {
            return Err(MarketError::Config("seed idea must not be empty".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(MarketError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.fit_threshold) {
            return Err(MarketError::Config(format!(
                "fit_threshold must be within 0-100, got {}",
                self.fit_threshold
            )));
        }
        if self.population_size < MIN_POPULATION_SIZE {
            return Err(MarketError::Config(format!(
                "population_size must be at least {}, got {}",
                MIN_POPULATION_SIZE, self.population_size
            )));
        }
        if self.simulation_concurrency == 0 {
            return Err(MarketError::Config(
                "simulation_concurrency must be at least 1".to_string(),
            ));
        }
        self.demographics.validate()
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Completion providers per agent role
#[derive(Clone)]
pub struct AgentProviders {
    pub ideator: SharedProvider,
    pub persona_generator: SharedProvider,
    pub simulator: SharedProvider,
    pub critic: SharedProvider,
}

impl AgentProviders {
    /// One provider for every role
    pub fn shared(provider: SharedProvider) -> Self {
        Self {
            ideator: provider.clone(),
            persona_generator: provider.clone(),
            simulator: provider.clone(),
            critic: provider,
        }
    }

    /// HTTP providers for every role, all drawing on `limiter`
    pub fn from_config(
        config: &Config,
        limiter: Arc<SlidingWindowLimiter>,
        metrics: SharedMetrics,
    ) -> Result<Self> {
        let build = |role| create_provider(config, role, limiter.clone(), metrics.clone());
        Ok(Self {
            ideator: build(AgentRole::Ideator)?,
            persona_generator: build(AgentRole::PersonaGenerator)?,
            simulator: build(AgentRole::Simulator)?,
            critic: build(AgentRole::Critic)?,
        })
    }
}

pub struct RefinementController {
    providers: AgentProviders,
    scorer: Arc<dyn FitScorer>,
    observer: SharedObserver,
}

impl RefinementController {
    pub fn new(
        providers: AgentProviders,
        scorer: Arc<dyn FitScorer>,
        observer: SharedObserver,
    ) -> Self {
        Self {
            providers,
            scorer,
            observer,
        }
    }

    /// Run to completion from a fresh state
    pub async fn run(
        &self,
        params: &RunParameters,
        cancel: &CancellationToken,
    ) -> Result<WorkflowState> {
        let mut state = WorkflowState::new(params);
        self.drive(params, &mut state, cancel).await?;
        Ok(state)
    }

    /// Advance `state` until it reaches `Finalize`.
    ///
    /// On error the state keeps everything committed so far; an interrupted
    /// simulation leaves `responses`, `history` and the population untouched.
    #[instrument(skip_all, fields(run_id = %state.run_id))]
    pub async fn drive(
        &self,
        params: &RunParameters,
        state: &mut WorkflowState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        params.validate()?;

        let ideator = Ideator::new(self.providers.ideator.clone());
        let critic = Critic::new(self.providers.critic.clone());
        let simulator = MarketSimulator::new(
            self.providers.simulator.clone(),
            params.simulation_concurrency,
            self.observer.clone(),
        );

        let mut pending: Option<ScoredResponses> = None;
        let mut simulation_skipped = 0;

        while state.stage != Stage::Finalize {
            if cancel.is_cancelled() {
                return Err(MarketError::Cancelled(format!(
                    "run cancelled before {} in iteration {}",
                    state.stage, state.iteration
                )));
            }
            self.observer.notify(&ProgressEvent::StageStarted {
                iteration: state.iteration,
                stage: state.stage,
            });

            let stage = state.stage;
            state.stage = match stage {
                Stage::PopulateOnce => {
                    if state.population.is_empty() {
                        let sampler = PopulationSampler::new(
                            self.providers.persona_generator.clone(),
                            self.observer.clone(),
                        );
                        let population = sampler
                            .generate(params.population_size, &params.demographics)
                            .await?;
                        state.population = Arc::new(population.personas);
                        state.population_report = Some(population.report);
                    }
                    Stage::Ideate
                }

                Stage::Ideate => {
                    let concept = match (&state.concept, &state.feedback) {
                        (Some(previous), feedback) => {
                            let fallback = CriticFeedback::default();
                            let feedback = feedback.as_ref().unwrap_or(&fallback);
                            ideator
                                .refine_concept(previous, feedback, state.score.as_ref())
                                .await?
                        }
                        (None, _) => ideator.generate_concept(&params.seed_idea).await?,
                    };
                    state.candidate_concept = Some(concept);
                    state.iteration += 1;
                    Stage::Simulate
                }

                Stage::Simulate => {
                    let concept = candidate_concept(state)?;
                    let population = Arc::clone(&state.population);
                    let outcome = simulator.simulate(concept, &population, cancel).await?;
                    if outcome.responses.is_empty() {
                        return Err(MarketError::InsufficientData {
                            required: 1,
                            actual: 0,
                        });
                    }
                    state.responses = outcome.responses;
                    simulation_skipped = outcome.skipped;
                    Stage::Score
                }

                Stage::Score => {
                    let mut scored = self.scorer.score(state.responses.clone()).await?;
                    scored.score.skipped_respondents += simulation_skipped;
                    let entry = HistoryEntry {
                        iteration: state.iteration,
                        concept_name: candidate_concept(state)?.name.clone(),
                        fit_score: scored.score.fit_score,
                        nps: scored.score.nps,
                        avg_interest: scored.score.avg_interest,
                    };
                    self.observer.notify(&ProgressEvent::IterationCompleted {
                        iteration: entry.iteration,
                        concept: entry.concept_name.clone(),
                        fit_score: entry.fit_score,
                        nps: entry.nps,
                    });
                    state.history.push(entry);
                    if let Some(candidate) = state.candidate_concept.take() {
                        state.concept = Some(candidate);
                    }
                    state.score = Some(scored.score.clone());
                    pending = Some(scored);
                    Stage::Critique
                }

                Stage::Critique => {
                    let scored = match pending.take() {
                        Some(scored) => scored,
                        // resumed state: ratings are not persisted
                        None => self.scorer.score(state.responses.clone()).await?,
                    };
                    let concept = current_concept(state)?;
                    let sample = select_feedback_sample(&scored.rated, params.feedback_samples);
                    let feedback = self
                        .critique(&critic, concept, &scored.score, &render_feedback_sample(&sample))
                        .await?;
                    state.feedback = Some(feedback);
                    Stage::Decide
                }

                Stage::Decide => {
                    let met = state.met_threshold();
                    if met || state.iteration >= params.max_iterations {
                        state.should_continue = false;
                        info!(
                            iteration = state.iteration,
                            met_threshold = met,
                            "Refinement finished"
                        );
                        Stage::Finalize
                    } else {
                        Stage::Ideate
                    }
                }

                Stage::Finalize => Stage::Finalize,
            };
        }

        state.finished_at = Some(Utc::now());
        self.observer.notify(&ProgressEvent::RunFinished {
            iterations: state.iteration,
            fit_score: state.score.as_ref().map(|s| s.fit_score),
            met_threshold: state.met_threshold(),
        });
        Ok(())
    }

    /// Structured critique, degrading to quick text feedback on a non-fatal failure
    async fn critique(
        &self,
        critic: &Critic,
        concept: &ProductConcept,
        score: &MarketFitScore,
        sample: &str,
    ) -> Result<CriticFeedback> {
        match critic.analyze(concept, score, sample).await {
            Ok(feedback) => Ok(feedback),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Structured critique failed, using quick feedback: {}", e);
                let text = critic.quick_feedback(concept, score).await;
                Ok(CriticFeedback {
                    strategic_direction: text,
                    ..CriticFeedback::default()
                })
            }
        }
    }
}

fn current_concept(state: &WorkflowState) -> Result<&ProductConcept> {
    state
        .concept
        .as_ref()
        .ok_or_else(|| MarketError::Config("no concept available for this stage".to_string()))
}

/// Concept under evaluation; falls back to the committed one for resumed states
fn candidate_concept(state: &WorkflowState) -> Result<&ProductConcept> {
    match &state.candidate_concept {
        Some(concept) => Ok(concept),
        None => current_concept(state),
    }
}
