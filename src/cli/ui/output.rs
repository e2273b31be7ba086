use console::style;

use crate::market::MarketFitScore;
use crate::types::ProductConcept;
use crate::workflow::HistoryEntry;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn field(&self, key: &str, value: impl std::fmt::Display) {
        println!("  {:<22} {}", style(key).dim(), value);
    }

    pub fn concept(&self, concept: &ProductConcept) {
        self.section(&concept.name);
        println!("  {}", style(&concept.tagline).italic());
        self.field("Target market", &concept.target_market);
        self.field("Pricing", &concept.pricing_model);
        for feature in &concept.features {
            println!("  • {}", feature);
        }
    }

    pub fn score(&self, score: &MarketFitScore, threshold: f64) {
        self.section("Market fit");
        let fit = format!("{:.1}%", score.fit_score);
        let fit = if score.meets_threshold(threshold) {
            style(fit).green().bold()
        } else {
            style(fit).yellow().bold()
        };
        self.field("Fit score", fit);
        self.field("NPS", score.nps);
        self.field("Avg interest", format!("{:.2}/5", score.avg_interest));
        self.field(
            "Avg purchase intent",
            format!("{:.2}/5", score.avg_purchase_intent),
        );
        self.field("Target market", format!("{:.1}%", score.target_market_size));
        self.field(
            "Superfan ratio",
            format!(
                "{:.4} (joint {:.4})",
                score.superfan_ratio, score.joint_superfan_ratio
            ),
        );
        self.field("Recommendation", &score.recommendation);
        self.field("Business model", &score.business_model);
        self.field(
            "Respondents",
            format!(
                "{} rated, {} skipped",
                score.total_respondents, score.skipped_respondents
            ),
        );
        if !score.statistically_reliable {
            self.warning("Fewer than 10 rated respondents; treat these numbers as indicative");
        }
    }

    pub fn history(&self, history: &[HistoryEntry]) {
        if history.is_empty() {
            return;
        }
        self.section("Iterations");
        for entry in history {
            println!(
                "  {:>2}. {:<30} fit {:>5.1}%  NPS {:>4}  interest {:.2}",
                entry.iteration, entry.concept_name, entry.fit_score, entry.nps, entry.avg_interest
            );
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
