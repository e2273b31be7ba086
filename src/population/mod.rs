//! Population Sampler
//!
//! Builds the synthetic respondent population in small batches. Stratified
//! batches ask for personas steered toward the buckets furthest below quota;
//! after repeated empty batches the sampler falls back to unconstrained
//! generation for the remaining shortfall. Quotas steer, they never block.

mod distribution;

pub use distribution::{
    BucketQuota, BucketReport, Facet, FacetCounts, FacetQuota, FacetReport, QuotaPlan, SlotTarget,
    diversity_score, facet_reports, realized_counts,
};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::ai::prompt::PromptBuilder;
use crate::ai::provider::SharedProvider;
use crate::ai::validation::{extract_json_from_response, extract_record_array};
use crate::config::DemographicsConfig;
use crate::constants::population::{BATCH_SIZE, MAX_FAILED_BATCHES};
use crate::types::{MarketError, Persona, Result, log_filter_warn};
use crate::workflow::{ProgressEvent, SharedObserver};

const BATCH_TITLE: &str = "PersonaBatch";

/// Realized distribution and quality signals for a built population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationReport {
    pub size: usize,
    pub diversity_score: f64,
    pub used_fallback: bool,
    pub failed_batches: usize,
    pub facets: Vec<FacetReport>,
}

#[derive(Debug, Clone)]
pub struct Population {
    pub personas: Vec<Persona>,
    pub report: PopulationReport,
}

pub struct PopulationSampler {
    provider: SharedProvider,
    observer: SharedObserver,
}

/// Which generation mode the sampler is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stratified,
    Unconstrained,
}

impl PopulationSampler {
    pub fn new(provider: SharedProvider, observer: SharedObserver) -> Self {
        Self { provider, observer }
    }

    #[instrument(skip_all, fields(population_size = size))]
    pub async fn generate(
        &self,
        size: usize,
        demographics: &DemographicsConfig,
    ) -> Result<Population> {
        let plan = QuotaPlan::new(size, demographics);
        let mut phase = if plan.is_constrained() {
            Phase::Stratified
        } else {
            Phase::Unconstrained
        };
        let mut used_fallback = false;

        let mut personas: Vec<Persona> = Vec::with_capacity(size);
        let mut batch = 0;
        let mut consecutive_failures = 0;
        let mut failed_batches = 0;

        while personas.len() < size {
            batch += 1;
            let want = BATCH_SIZE.min(size - personas.len());

            let result = match phase {
                Phase::Stratified => {
                    let slots = plan.assign_batch(&realized_counts(&personas), want);
                    self.stratified_batch(&slots).await
                }
                Phase::Unconstrained => self.unconstrained_batch(want).await,
            };

            let reason = match result {
                Ok(generated) if !generated.is_empty() => {
                    debug!(batch, generated = generated.len(), "Persona batch accepted");
                    consecutive_failures = 0;
                    personas.extend(generated);
                    continue;
                }
                Ok(_) => "no valid personas in batch".to_string(),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => e.to_string(),
            };

            consecutive_failures += 1;
            failed_batches += 1;
            self.observer.notify(&ProgressEvent::PersonaBatchFailed {
                batch,
                consecutive: consecutive_failures,
                reason: reason.clone(),
            });

            if consecutive_failures >= MAX_FAILED_BATCHES {
                match phase {
                    Phase::Stratified => {
                        phase = Phase::Unconstrained;
                        used_fallback = true;
                        consecutive_failures = 0;
                        self.observer.notify(&ProgressEvent::FallbackActivated {
                            shortfall: size - personas.len(),
                        });
                    }
                    Phase::Unconstrained => {
                        return Err(MarketError::PersonaGeneration(format!(
                            "{} consecutive batches failed with {} of {} personas generated (last: {})",
                            consecutive_failures,
                            personas.len(),
                            size,
                            reason
                        )));
                    }
                }
            }
        }

        personas.truncate(size);

        let report = PopulationReport {
            size: personas.len(),
            diversity_score: diversity_score(&personas),
            used_fallback,
            failed_batches,
            facets: facet_reports(&personas, &plan),
        };
        info!(
            size = report.size,
            diversity = report.diversity_score,
            used_fallback,
            "Population generated"
        );
        self.observer.notify(&ProgressEvent::PopulationReady {
            size: report.size,
            diversity: report.diversity_score,
            used_fallback,
        });

        Ok(Population { personas, report })
    }

    async fn stratified_batch(&self, slots: &[SlotTarget]) -> Result<Vec<Persona>> {
        let targets: Vec<String> = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| format!("Persona {}: {}", i + 1, slot.describe()))
            .collect();

        let objective = format!(
            "Create exactly {} distinct personas matching the demographic targets below",
            slots.len()
        );
        let prompt = PromptBuilder::new()
            .role("You create realistic, varied consumer personas for market research.")
            .objectives(vec![objective.as_str()])
            .list("Demographic targets", &targets)
            .rules(persona_rules())
            .build();

        let response = self.provider.complete(&prompt, &batch_schema()).await?;
        Ok(parse_batch(&response.content))
    }

    async fn unconstrained_batch(&self, count: usize) -> Result<Vec<Persona>> {
        let objective = format!(
            "Create exactly {} distinct personas spanning different ages, incomes, locations and attitudes to technology",
            count
        );
        let prompt = PromptBuilder::new()
            .role("You create realistic, varied consumer personas for market research.")
            .objectives(vec![objective.as_str()])
            .rules(persona_rules())
            .text(&format!(
                "Respond with a JSON array of persona objects with these fields:\n{}",
                Persona::schema()["properties"]
            ))
            .build();

        let response = self.provider.complete_text(&prompt).await?;
        let value = extract_json_from_response(&response.text)?;
        Ok(parse_batch(&value))
    }
}

fn persona_rules() -> Vec<&'static str> {
    vec![
        "Ages between 18 and 85",
        "income_bracket is one of: low, lower-middle, middle, upper-middle, high",
        "location_type is one of: urban, suburban, rural",
        "tech_savviness is an integer from 1 to 5",
        "Give exactly two values and two pain points per persona",
    ]
}

fn batch_schema() -> Value {
    json!({
        "title": BATCH_TITLE,
        "type": "object",
        "required": ["personas"],
        "properties": {
            "personas": {"type": "array", "items": Persona::schema()}
        }
    })
}

/// Parse every record, dropping the malformed ones individually
fn parse_batch(payload: &Value) -> Vec<Persona> {
    extract_record_array(payload, "persona")
        .unwrap_or_default()
        .iter()
        .filter_map(|record| log_filter_warn(Persona::from_value(record), "Discarding persona record"))
        .collect()
}
