//! Structured critique of one iteration's market reaction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticFeedback {
    #[serde(default)]
    pub strengths_to_amplify: Vec<String>,
    #[serde(default)]
    pub critical_gaps: Vec<String>,
    /// Suggestions grouped by category (e.g. "features", "pricing")
    #[serde(default)]
    pub refinements: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub strategic_direction: String,
}

impl CriticFeedback {
    /// Render as the feedback section of a refinement request
    pub fn to_refinement_prompt(&self) -> String {
        let mut out = String::new();

        if !self.strengths_to_amplify.is_empty() {
            out.push_str("## Strengths to amplify\n");
            for s in &self.strengths_to_amplify {
                out.push_str(&format!("- {}\n", s));
            }
            out.push('\n');
        }

        if !self.critical_gaps.is_empty() {
            out.push_str("## Critical gaps\n");
            for g in &self.critical_gaps {
                out.push_str(&format!("- {}\n", g));
            }
            out.push('\n');
        }

        if !self.refinements.is_empty() {
            out.push_str("## Refinements\n");
            for (category, items) in &self.refinements {
                out.push_str(&format!("### {}\n", category));
                for item in items {
                    out.push_str(&format!("- {}\n", item));
                }
            }
            out.push('\n');
        }

        if !self.strategic_direction.is_empty() {
            out.push_str(&format!(
                "## Strategic direction\n{}\n",
                self.strategic_direction
            ));
        }

        out
    }

    pub fn is_empty(&self) -> bool {
        self.strengths_to_amplify.is_empty()
            && self.critical_gaps.is_empty()
            && self.refinements.is_empty()
            && self.strategic_direction.trim().is_empty()
    }

    pub fn schema() -> Value {
        json!({
            "title": "CriticFeedback",
            "type": "object",
            "required": ["strengths_to_amplify", "critical_gaps", "refinements", "strategic_direction"],
            "properties": {
                "strengths_to_amplify": {"type": "array", "items": {"type": "string"}},
                "critical_gaps": {"type": "array", "items": {"type": "string"}},
                "refinements": {
                    "type": "object",
                    "additionalProperties": {"type": "array", "items": {"type": "string"}}
                },
                "strategic_direction": {"type": "string"}
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refinement_prompt_sections() {
        let mut refinements = BTreeMap::new();
        refinements.insert("pricing".to_string(), vec!["Add a free tier".to_string()]);
        let feedback = CriticFeedback {
            strengths_to_amplify: vec!["Saves time".into()],
            critical_gaps: vec!["Privacy".into()],
            refinements,
            strategic_direction: "Focus on freelancers".into(),
        };

        let prompt = feedback.to_refinement_prompt();
        assert!(prompt.contains("## Strengths to amplify\n- Saves time"));
        assert!(prompt.contains("### pricing\n- Add a free tier"));
        assert!(prompt.ends_with("Focus on freelancers\n"));
        assert!(!feedback.is_empty());
    }

    #[test]
    fn test_lenient_parse() {
        let parsed: CriticFeedback =
            serde_json::from_value(json!({"critical_gaps": ["trust"]})).unwrap();
        assert_eq!(parsed.critical_gaps, vec!["trust"]);
        assert!(parsed.to_refinement_prompt().contains("trust"));
        assert!(CriticFeedback::default().is_empty());
    }
}
