//! Product concept produced by the ideation stage.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::{MarketError, Result};

/// A product concept. Each refinement produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductConcept {
    pub name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub target_market: String,
    #[serde(default, alias = "problem_statement")]
    pub problem_solved: String,
    pub features: Vec<String>,
    #[serde(default)]
    pub differentiators: Vec<String>,
    #[serde(default)]
    pub pricing_model: String,
}

impl ProductConcept {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MarketError::invalid_record("concept", "missing name"));
        }
        if self.features.iter().all(|f| f.trim().is_empty()) {
            return Err(MarketError::invalid_record("concept", "no features"));
        }
        Ok(())
    }

    /// Human-readable block used in simulation and critique prompts
    pub fn to_summary(&self) -> String {
        let mut out = format!("**{}**", self.name);
        if !self.tagline.is_empty() {
            out.push_str(&format!(" - {}", self.tagline));
        }
        out.push('\n');
        if !self.target_market.is_empty() {
            out.push_str(&format!("\nTarget market: {}", self.target_market));
        }
        if !self.problem_solved.is_empty() {
            out.push_str(&format!("\nProblem solved: {}", self.problem_solved));
        }
        out.push_str("\n\nKey features:\n");
        for feature in &self.features {
            out.push_str(&format!("- {}\n", feature));
        }
        if !self.differentiators.is_empty() {
            out.push_str("\nDifferentiators:\n");
            for item in &self.differentiators {
                out.push_str(&format!("- {}\n", item));
            }
        }
        if !self.pricing_model.is_empty() {
            out.push_str(&format!("\nPricing: {}\n", self.pricing_model));
        }
        out
    }

    pub fn schema() -> Value {
        json!({
            "title": "ProductConcept",
            "type": "object",
            "required": ["name", "tagline", "target_market", "problem_solved", "features", "differentiators", "pricing_model"],
            "properties": {
                "name": {"type": "string"},
                "tagline": {"type": "string"},
                "target_market": {"type": "string"},
                "problem_solved": {"type": "string"},
                "features": {"type": "array", "items": {"type": "string"}, "minItems": 3},
                "differentiators": {"type": "array", "items": {"type": "string"}},
                "pricing_model": {"type": "string"}
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept() -> ProductConcept {
        ProductConcept {
            name: "FocusFlow".into(),
            tagline: "Deep work, on autopilot".into(),
            target_market: "Remote knowledge workers".into(),
            problem_solved: "Constant context switching".into(),
            features: vec!["Smart blocking".into(), "Daily review".into()],
            differentiators: vec!["Learns your rhythm".into()],
            pricing_model: "$8/month".into(),
        }
    }

    #[test]
    fn test_summary_contains_fields() {
        let summary = concept().to_summary();
        assert!(summary.starts_with("**FocusFlow** - Deep work"));
        assert!(summary.contains("- Smart blocking"));
        assert!(summary.contains("Pricing: $8/month"));
    }

    #[test]
    fn test_validate() {
        assert!(concept().validate().is_ok());
        let mut bad = concept();
        bad.features.clear();
        assert!(bad.validate().is_err());
        let mut unnamed = concept();
        unnamed.name = " ".into();
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_problem_statement_alias() {
        let parsed: ProductConcept = serde_json::from_value(json!({
            "name": "X",
            "problem_statement": "slow onboarding",
            "features": ["a"]
        }))
        .unwrap();
        assert_eq!(parsed.problem_solved, "slow onboarding");
        assert!(parsed.differentiators.is_empty());
    }
}
