use tracing::{info, instrument};

use crate::ai::prompt::PromptBuilder;
use crate::ai::provider::{SharedProvider, parse_content};
use crate::market::MarketFitScore;
use crate::types::{CriticFeedback, ProductConcept, Result};

const ROLE: &str = "You are a product strategist who turns rough ideas into sharp, testable product concepts.";

/// Produces the initial concept and every refinement
pub struct Ideator {
    provider: SharedProvider,
}

impl Ideator {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    #[instrument(skip_all)]
    pub async fn generate_concept(&self, seed_idea: &str) -> Result<ProductConcept> {
        let prompt = PromptBuilder::new()
            .role(ROLE)
            .section("Idea", seed_idea)
            .objectives(vec![
                "Name the product and write a one-line tagline",
                "Describe the target market and the problem solved",
                "List at least three concrete features and the differentiators",
                "Propose a pricing model",
            ])
            .rules(vec![
                "Be specific: no generic buzzwords",
                "Features must be things a customer can use, not aspirations",
            ])
            .build();

        let concept = self.request(&prompt).await?;
        info!(concept = %concept.name, "Generated initial concept");
        Ok(concept)
    }

    /// Produce a new concept from the previous one and the critique of it
    #[instrument(skip_all, fields(previous = %previous.name))]
    pub async fn refine_concept(
        &self,
        previous: &ProductConcept,
        feedback: &CriticFeedback,
        score: Option<&MarketFitScore>,
    ) -> Result<ProductConcept> {
        let mut builder = PromptBuilder::new()
            .role(ROLE)
            .section("Current concept", &previous.to_summary());
        if let Some(score) = score {
            builder = builder.section("Market response", &score.to_prompt_context());
        }
        let prompt = builder
            .section("Feedback", &feedback.to_refinement_prompt())
            .objectives(vec![
                "Keep what resonated and amplify it",
                "Close the critical gaps named in the feedback",
                "Apply the suggested refinements where they make the product stronger",
            ])
            .rules(vec![
                "Return a complete concept, not a diff",
                "The name may change only if the feedback calls for repositioning",
            ])
            .build();

        let concept = self.request(&prompt).await?;
        info!(concept = %concept.name, "Refined concept");
        Ok(concept)
    }

    async fn request(&self, prompt: &str) -> Result<ProductConcept> {
        let response = self
            .provider
            .complete(prompt, &ProductConcept::schema())
            .await?;
        let concept: ProductConcept = parse_content(&response, self.provider.name())?;
        concept.validate()?;
        Ok(concept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedProvider, concept_record, critic_record};
    use crate::types::MarketError;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_generate_concept() {
        let provider = ScriptedProvider::new().on("ProductConcept", |prompt| {
            assert!(prompt.contains("meal planning for parents"));
            Ok(concept_record("MealMate"))
        });
        let concept = Ideator::new(Arc::new(provider))
            .generate_concept("meal planning for parents")
            .await
            .unwrap();
        assert_eq!(concept.name, "MealMate");
        assert_eq!(concept.features.len(), 2);
    }

    #[tokio::test]
    async fn test_refine_includes_feedback() {
        let provider = ScriptedProvider::new().on("ProductConcept", |prompt| {
            assert!(prompt.contains("**MealMate**"));
            assert!(prompt.contains("Offer a free tier"));
            Ok(concept_record("MealMate Plus"))
        });
        let previous: ProductConcept = serde_json::from_value(concept_record("MealMate")).unwrap();
        let feedback: CriticFeedback = serde_json::from_value(critic_record()).unwrap();

        let refined = Ideator::new(Arc::new(provider))
            .refine_concept(&previous, &feedback, None)
            .await
            .unwrap();
        assert_eq!(refined.name, "MealMate Plus");
    }

    #[tokio::test]
    async fn test_invalid_concept_rejected() {
        let provider = ScriptedProvider::new()
            .on("ProductConcept", |_| Ok(json!({"name": "", "features": []})));
        let err = Ideator::new(Arc::new(provider))
            .generate_concept("anything")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidRecord { kind: "concept", .. }));
    }
}
