//! Market simulation
//!
//! Asks every persona of the cached population to react to a concept, with at
//! most `concurrency` calls in flight. A single persona's failure is skipped;
//! an authentication failure aborts the batch.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::RatedResponse;
use crate::ai::prompt::PromptBuilder;
use crate::ai::provider::{SharedProvider, parse_content};
use crate::constants::workflow::SAMPLE_MAX_DETRACTORS;
use crate::types::{MarketError, Persona, PersonaResponse, ProductConcept, Result};
use crate::workflow::{ProgressEvent, SharedObserver};

/// Responses gathered for one iteration
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub responses: Vec<PersonaResponse>,
    pub skipped: usize,
}

pub struct MarketSimulator {
    provider: SharedProvider,
    concurrency: usize,
    observer: SharedObserver,
}

impl MarketSimulator {
    pub fn new(provider: SharedProvider, concurrency: usize, observer: SharedObserver) -> Self {
        Self {
            provider,
            concurrency: concurrency.max(1),
            observer,
        }
    }

    #[instrument(skip_all, fields(concept = %concept.name, personas = population.len()))]
    pub async fn simulate(
        &self,
        concept: &ProductConcept,
        population: &[Persona],
        cancel: &CancellationToken,
    ) -> Result<SimulationOutcome> {
        let summary = concept.to_summary();
        let mut results = stream::iter(population)
            .map(|persona| {
                let summary = &summary;
                async move { (persona, self.simulate_one(summary, persona).await) }
            })
            .buffer_unordered(self.concurrency);

        let mut responses = Vec::with_capacity(population.len());
        let mut skipped = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(MarketError::Cancelled(format!(
                        "simulation of '{}' cancelled after {} responses",
                        concept.name,
                        responses.len()
                    )));
                }
                next = results.next() => next,
            };
            let Some((persona, result)) = next else { break };

            match result {
                Ok(response) => responses.push(response),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    skipped += 1;
                    self.observer.notify(&ProgressEvent::PersonaSkipped {
                        persona: persona.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            responses = responses.len(),
            skipped, "Simulation complete"
        );
        Ok(SimulationOutcome { responses, skipped })
    }

    async fn simulate_one(&self, concept_summary: &str, persona: &Persona) -> Result<PersonaResponse> {
        let prompt = PromptBuilder::new()
            .role(&format!(
                "You are {}, a real consumer. Stay in character and answer the way this person would.",
                persona.name
            ))
            .section("Your profile", &persona.to_prompt_context())
            .section("Product concept", concept_summary)
            .objectives(vec![
                "Say how interested you are in this product",
                "Say whether you would buy it",
                "Say how you would feel if this product were no longer available",
                "Say whether you would recommend it to a friend",
                "Name the single biggest benefit for you and list your concerns",
            ])
            .rules(vec![
                "Answer in natural first-person language, one or two sentences per answer",
                "Do not give numeric ratings or scores",
                "Be honest: if the product does not fit your life, say so",
            ])
            .build();

        let response = self
            .provider
            .complete(&prompt, &PersonaResponse::schema())
            .await?;
        let mut parsed: PersonaResponse = parse_content(&response, self.provider.name())?;
        parsed.persona_name = persona.name.clone();
        debug!(persona = %persona.name, "Simulated response");
        Ok(parsed)
    }
}

// =============================================================================
// Feedback sampling
// =============================================================================

/// Pick a diverse sample for the critic, classifying each respondent by the
/// modal level of their recommendation PMF: at least one promoter, up to two
/// detractors, one passive, then fill in input order.
pub fn select_feedback_sample(rated: &[RatedResponse], size: usize) -> Vec<&RatedResponse> {
    let level = |r: &RatedResponse| r.ratings.recommendation.mode();
    let promoters: Vec<usize> = (0..rated.len()).filter(|&i| level(&rated[i]) == 5).collect();
    let passives: Vec<usize> = (0..rated.len()).filter(|&i| level(&rated[i]) == 4).collect();
    let detractors: Vec<usize> = (0..rated.len()).filter(|&i| level(&rated[i]) <= 3).collect();

    let mut picked: Vec<usize> = Vec::with_capacity(size);
    let preferred = promoters
        .iter()
        .take(1)
        .chain(detractors.iter().take(SAMPLE_MAX_DETRACTORS))
        .chain(passives.iter().take(1));
    for &i in preferred {
        if picked.len() < size {
            picked.push(i);
        }
    }
    for i in 0..rated.len() {
        if picked.len() >= size {
            break;
        }
        if !picked.contains(&i) {
            picked.push(i);
        }
    }

    picked.into_iter().map(|i| &rated[i]).collect()
}

/// Numbered block of raw answers for the critique prompt
pub fn render_feedback_sample(sample: &[&RatedResponse]) -> String {
    let mut out = String::new();
    for (i, rated) in sample.iter().enumerate() {
        let r = &rated.response;
        let concerns = if r.concerns.is_empty() {
            "none".to_string()
        } else {
            r.concerns.join(", ")
        };
        out.push_str(&format!(
            "{}. {}:\n   - Interest: {}\n   - Disappointment: {}\n   - Recommendation: {}\n   - Main Benefit: {}\n   - Concerns: {}\n\n",
            i + 1,
            r.persona_name,
            r.interest_response,
            r.disappointment_response,
            r.recommendation_response,
            r.main_benefit,
            concerns,
        ));
    }
    out.trim_end().to_string()
}
