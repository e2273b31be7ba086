use tracing::{instrument, warn};

use crate::ai::prompt::PromptBuilder;
use crate::ai::provider::{SharedProvider, parse_content};
use crate::market::{MarketFitScore, RankedItem};
use crate::types::{CriticFeedback, ProductConcept, Result};

const QUICK_FEEDBACK_FALLBACK: &str = "Unable to generate feedback. Continue with current concept.";

/// Turns a scored iteration into refinement guidance
pub struct Critic {
    provider: SharedProvider,
}

impl Critic {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    /// Structured critique from the score and a sample of raw answers
    #[instrument(skip_all, fields(concept = %concept.name))]
    pub async fn analyze(
        &self,
        concept: &ProductConcept,
        score: &MarketFitScore,
        sample: &str,
    ) -> Result<CriticFeedback> {
        let prompt = PromptBuilder::new()
            .role("You are a blunt product critic. You read market research and say exactly what to change.")
            .section("Concept", &concept.to_summary())
            .section("Market response", &score.to_prompt_context())
            .section("Sample responses", sample)
            .objectives(vec![
                "Name the strengths respondents valued most",
                "Name the gaps that kept respondents from being very disappointed to lose the product",
                "Group concrete refinements by category such as features, pricing, positioning",
                "State the single strategic direction for the next version",
            ])
            .rules(vec![
                "Ground every point in the responses or metrics above",
                "Prefer a few high-impact changes over many small ones",
            ])
            .build();

        let response = self
            .provider
            .complete(&prompt, &CriticFeedback::schema())
            .await?;
        let feedback: CriticFeedback = parse_content(&response, self.provider.name())?;
        if feedback.is_empty() {
            warn!("Critic returned empty feedback");
        }
        Ok(feedback)
    }

    /// Short free-text suggestions. Never fails: a provider error yields a
    /// fixed fallback sentence.
    pub async fn quick_feedback(&self, concept: &ProductConcept, score: &MarketFitScore) -> String {
        let top = |items: &[RankedItem]| {
            items
                .iter()
                .take(3)
                .map(|i| i.text.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let prompt = PromptBuilder::new()
            .role("You are a product strategist providing concise refinement advice.")
            .context_item("Product", &concept.name)
            .context_item("Fit score", format!("{:.1}%", score.fit_score))
            .context_item("Top benefits", top(&score.top_benefits))
            .context_item("Top concerns", top(&score.top_concerns))
            .text("Provide 2-3 specific, actionable refinements to improve the fit score.")
            .build();

        match self.provider.complete_text(&prompt).await {
            Ok(response) if !response.text.trim().is_empty() => response.text.trim().to_string(),
            Ok(_) => QUICK_FEEDBACK_FALLBACK.to_string(),
            Err(e) => {
                warn!("Quick feedback failed: {}", e);
                QUICK_FEEDBACK_FALLBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{FitAggregator, RatedResponse, RespondentRatings};
    use crate::ssr::Pmf;
    use crate::test_support::{ScriptedProvider, concept_record, critic_record, response};
    use crate::types::{ErrorCategory, LlmError};
    use std::sync::Arc;

    fn concept() -> ProductConcept {
        serde_json::from_value(concept_record("MealMate")).unwrap()
    }

    fn score() -> MarketFitScore {
        let rated: Vec<RatedResponse> = (0..3)
            .map(|i| RatedResponse {
                response: response(&format!("p{}", i)),
                ratings: RespondentRatings::uniform_across(Pmf::uniform()),
            })
            .collect();
        FitAggregator::aggregate(&rated, 0).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_parses_feedback() {
        let provider = ScriptedProvider::new().on("CriticFeedback", |prompt| {
            assert!(prompt.contains("1. Ana:"));
            assert!(prompt.contains("Fit score: 40.0%"));
            Ok(critic_record())
        });
        let feedback = Critic::new(Arc::new(provider))
            .analyze(&concept(), &score(), "1. Ana:\n   - Interest: meh")
            .await
            .unwrap();
        assert_eq!(feedback.critical_gaps, vec!["Pricing unclear"]);
        assert_eq!(feedback.refinements["pricing"], vec!["Offer a free tier"]);
    }

    #[tokio::test]
    async fn test_quick_feedback_text() {
        let provider = ScriptedProvider::new().on_text(|prompt| {
            assert!(prompt.contains("**Top concerns**: Price"));
            Ok("  Add a free tier.  ".to_string())
        });
        let text = Critic::new(Arc::new(provider))
            .quick_feedback(&concept(), &score())
            .await;
        assert_eq!(text, "Add a free tier.");
    }

    #[tokio::test]
    async fn test_quick_feedback_falls_back() {
        let provider = ScriptedProvider::new()
            .on_text(|_| Err(LlmError::new(ErrorCategory::Unavailable, "down").into()));
        let text = Critic::new(Arc::new(provider))
            .quick_feedback(&concept(), &score())
            .await;
        assert_eq!(text, QUICK_FEEDBACK_FALLBACK);
    }
}
