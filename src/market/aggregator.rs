//! Fit Aggregator
//!
//! Reduces per-respondent rating PMFs to survey-level PMFs (elementwise mean)
//! and reads every population metric off those aggregates. Aggregation is a
//! pure function of its input: the same rated responses always produce the
//! same score.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::constants::scoring::{
    BROAD_ENTHUSIAST_PCT, JOINT_SUPERFAN_DISAPPOINTMENT, JOINT_SUPERFAN_INTEREST,
    LUKEWARM_INTERESTED_PCT, MIN_RELIABLE_RESPONDENTS, MODERATE_ENTHUSIAST_PCT,
    STRONG_SUPERFAN_RATIO, TOP_ITEMS, VIABLE_SUPERFAN_RATIO,
};
use crate::ssr::{CalibratedScale, Dimension, Pmf, RatingConverter, RatingScale};
use crate::types::{MarketError, PersonaResponse, Result};

// =============================================================================
// Per-respondent ratings
// =============================================================================

/// One respondent's PMF per dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespondentRatings {
    pub interest: Pmf,
    pub purchase_intent: Pmf,
    pub disappointment: Pmf,
    pub recommendation: Pmf,
}

impl RespondentRatings {
    /// Same PMF on every dimension
    pub fn uniform_across(pmf: Pmf) -> Self {
        Self {
            interest: pmf,
            purchase_intent: pmf,
            disappointment: pmf,
            recommendation: pmf,
        }
    }

    pub fn get(&self, dimension: Dimension) -> &Pmf {
        match dimension {
            Dimension::Interest => &self.interest,
            Dimension::PurchaseIntent => &self.purchase_intent,
            Dimension::Disappointment => &self.disappointment,
            Dimension::Recommendation => &self.recommendation,
        }
    }
}

/// A response together with its ratings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedResponse {
    pub response: PersonaResponse,
    pub ratings: RespondentRatings,
}

/// Survey-level PMFs, one per dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyPmfs {
    pub interest: Pmf,
    pub purchase_intent: Pmf,
    pub disappointment: Pmf,
    pub recommendation: Pmf,
}

// =============================================================================
// Segmentation and decision tables
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSegmentation {
    pub superfans_pct: f64,
    /// Interest levels 4 and 5
    pub enthusiasts_pct: f64,
    pub interested_pct: f64,
    pub skeptical_pct: f64,
    pub very_disappointed_pct: f64,
    pub somewhat_disappointed_pct: f64,
    pub not_disappointed_pct: f64,
    pub promoters_pct: f64,
    pub passives_pct: f64,
    pub detractors_pct: f64,
}

impl MarketSegmentation {
    fn from_survey(survey: &SurveyPmfs, superfan_ratio: f64) -> Self {
        let pct = |pmf: &Pmf, levels: RangeInclusive<u8>| round2(pmf.mass(levels) * 100.0);
        Self {
            superfans_pct: round2(superfan_ratio * 100.0),
            enthusiasts_pct: pct(&survey.interest, 4..=5),
            interested_pct: pct(&survey.interest, 3..=3),
            skeptical_pct: pct(&survey.interest, 1..=2),
            very_disappointed_pct: pct(&survey.disappointment, 4..=5),
            somewhat_disappointed_pct: pct(&survey.disappointment, 3..=3),
            not_disappointed_pct: pct(&survey.disappointment, 1..=2),
            promoters_pct: pct(&survey.recommendation, 5..=5),
            passives_pct: pct(&survey.recommendation, 4..=4),
            detractors_pct: pct(&survey.recommendation, 1..=3),
        }
    }
}

/// Strategic recommendation selected from superfan ratio and enthusiasm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ProceedMassMarket,
    ProceedNiche,
    RefineModerateInterest,
    RefineLukewarm,
    Pivot,
}

impl Recommendation {
    pub fn select(superfan_ratio: f64, enthusiasts_pct: f64, interested_pct: f64) -> Self {
        if superfan_ratio >= VIABLE_SUPERFAN_RATIO {
            if enthusiasts_pct >= BROAD_ENTHUSIAST_PCT {
                Self::ProceedMassMarket
            } else {
                Self::ProceedNiche
            }
        } else if enthusiasts_pct >= MODERATE_ENTHUSIAST_PCT {
            Self::RefineModerateInterest
        } else if interested_pct >= LUKEWARM_INTERESTED_PCT {
            Self::RefineLukewarm
        } else {
            Self::Pivot
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::ProceedMassMarket => {
                "PROCEED (MASS MARKET): Strong core (10%+ superfans) + broad appeal (40%+ enthusiasts) - scale aggressively."
            }
            Self::ProceedNiche => {
                "PROCEED (NICHE): Viable superfan segment (10%+) - nail the niche first, expand later."
            }
            Self::RefineModerateInterest => {
                "REFINE: Moderate interest (30%+ enthusiasts) but no superfans yet - iterate value prop to create passionate advocates"
            }
            Self::RefineLukewarm => {
                "REFINE: Lukewarm response (50%+ mildly interested) - strengthen differentiation to convert interest into enthusiasm"
            }
            Self::Pivot => {
                "PIVOT: Weak market fit - consider major changes, different positioning, or new target market"
            }
        };
        f.write_str(text)
    }
}

/// Suggested business model, a finer split of the same two metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessModel {
    FreemiumMassMarket,
    PremiumNiche,
    ValueBasedPricing,
    PremiumCommunity,
    MidMarketSaas,
    NeedsRefinement,
}

impl BusinessModel {
    pub fn select(superfan_ratio: f64, enthusiasts_pct: f64) -> Self {
        let broad = enthusiasts_pct >= BROAD_ENTHUSIAST_PCT;
        if superfan_ratio >= STRONG_SUPERFAN_RATIO {
            if broad {
                Self::FreemiumMassMarket
            } else {
                Self::PremiumNiche
            }
        } else if superfan_ratio >= VIABLE_SUPERFAN_RATIO {
            if broad {
                Self::ValueBasedPricing
            } else {
                Self::PremiumCommunity
            }
        } else if enthusiasts_pct >= MODERATE_ENTHUSIAST_PCT {
            Self::MidMarketSaas
        } else {
            Self::NeedsRefinement
        }
    }
}

impl std::fmt::Display for BusinessModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::FreemiumMassMarket => {
                "Freemium/Mass Market: Wide adoption with premium tier for superfans. Large superfan base (15%+) + broad appeal (40%+ enthusiasts)"
            }
            Self::PremiumNiche => {
                "Premium/Niche: High price point for passionate niche. Strong superfan segment (15%+) willing to pay premium"
            }
            Self::ValueBasedPricing => {
                "Value-Based Pricing: Tiered pricing to capture both superfans and mainstream. Moderate superfans (10%+) + broad appeal"
            }
            Self::PremiumCommunity => {
                "Premium/Community: Build passionate community around superfans. Focus on retention and word-of-mouth"
            }
            Self::MidMarketSaas => {
                "Mid-Market/SaaS: Subscription model with clear value tiers. Moderate enthusiasm needs strong onboarding"
            }
            Self::NeedsRefinement => {
                "Needs refinement: Insufficient market enthusiasm for sustainable business model"
            }
        };
        f.write_str(text)
    }
}

// =============================================================================
// Market Fit Score
// =============================================================================

/// A benefit or concern with its frequency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedItem {
    pub text: String,
    pub count: usize,
}

/// Population-level result of one scoring pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketFitScore {
    /// Disappointment mass at levels 4-5, as a percentage
    pub fit_score: f64,
    pub avg_interest: f64,
    pub avg_purchase_intent: f64,
    pub nps: i32,
    pub segmentation: MarketSegmentation,
    pub target_market_size: f64,
    /// Product of the interest and disappointment marginals
    pub superfan_ratio: f64,
    /// Fraction of respondents individually meeting both superfan bars
    pub joint_superfan_ratio: f64,
    /// Likert level to probability
    pub interest_distribution: BTreeMap<u8, f64>,
    pub survey: SurveyPmfs,
    pub top_benefits: Vec<RankedItem>,
    pub top_concerns: Vec<RankedItem>,
    pub recommendation: Recommendation,
    pub business_model: BusinessModel,
    /// Respondents that were rated and aggregated
    pub total_respondents: usize,
    /// Respondents dropped because a rating failed
    pub skipped_respondents: usize,
    pub statistically_reliable: bool,
}

impl MarketFitScore {
    pub fn meets_threshold(&self, threshold: f64) -> bool {
        self.fit_score >= threshold
    }

    /// Compact metric block used in critique and refinement prompts
    pub fn to_prompt_context(&self) -> String {
        let seg = &self.segmentation;
        let items = |list: &[RankedItem]| {
            if list.is_empty() {
                "none reported".to_string()
            } else {
                list.iter()
                    .map(|i| format!("{} ({})", i.text, i.count))
                    .collect::<Vec<_>>()
                    .join("; ")
            }
        };
        format!(
            "Fit score: {:.1}% very disappointed\n\
             Average interest: {:.2}/5, average purchase intent: {:.2}/5\n\
             NPS: {}\n\
             Superfans: {:.1}%, enthusiasts: {:.1}%, interested: {:.1}%, skeptical: {:.1}%\n\
             Promoters: {:.1}%, passives: {:.1}%, detractors: {:.1}%\n\
             Target market size: {:.1}%\n\
             Top benefits: {}\n\
             Top concerns: {}\n\
             Recommendation: {}",
            self.fit_score,
            self.avg_interest,
            self.avg_purchase_intent,
            self.nps,
            seg.superfans_pct,
            seg.enthusiasts_pct,
            seg.interested_pct,
            seg.skeptical_pct,
            seg.promoters_pct,
            seg.passives_pct,
            seg.detractors_pct,
            self.target_market_size,
            items(&self.top_benefits),
            items(&self.top_concerns),
            self.recommendation,
        )
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Most frequent strings; ties keep first-occurrence order.
///
/// Surrounding whitespace is ignored and blank entries are dropped, since
/// model output pads list items inconsistently. Otherwise matching is exact:
/// no case folding, no punctuation stripping.
fn rank_items<'a>(items: impl Iterator<Item = &'a str>, limit: usize) -> Vec<RankedItem> {
    let mut ranked: Vec<RankedItem> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for item in items.map(str::trim).filter(|s| !s.is_empty()) {
        match index.get(item) {
            Some(&i) => ranked[i].count += 1,
            None => {
                index.insert(item, ranked.len());
                ranked.push(RankedItem {
                    text: item.to_string(),
                    count: 1,
                });
            }
        }
    }

    // stable sort keeps first occurrence ahead on ties
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

// =============================================================================
// Aggregator
// =============================================================================

pub struct FitAggregator;

impl FitAggregator {
    /// Aggregate rated responses into one score.
    ///
    /// `skipped` counts respondents whose rating failed upstream; it is
    /// reported but does not contribute to any metric.
    pub fn aggregate(rated: &[RatedResponse], skipped: usize) -> Result<MarketFitScore> {
        if rated.is_empty() {
            return Err(MarketError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        let survey_pmf = |dimension: Dimension| {
            Pmf::mean(rated.iter().map(|r| r.ratings.get(dimension))).unwrap_or_else(Pmf::uniform)
        };
        let survey = SurveyPmfs {
            interest: survey_pmf(Dimension::Interest),
            purchase_intent: survey_pmf(Dimension::PurchaseIntent),
            disappointment: survey_pmf(Dimension::Disappointment),
            recommendation: survey_pmf(Dimension::Recommendation),
        };

        let fit_score = round2(survey.disappointment.mass(4..=5) * 100.0);
        let nps = ((survey.recommendation.at(5) - survey.recommendation.mass(1..=3)) * 100.0)
            .round() as i32;
        let superfan_ratio = round4(survey.interest.at(5) * survey.disappointment.mass(4..=5));

        let joint_count = rated
            .iter()
            .filter(|r| {
                r.ratings.interest.expected_value() >= JOINT_SUPERFAN_INTEREST
                    && r.ratings.disappointment.expected_value() >= JOINT_SUPERFAN_DISAPPOINTMENT
            })
            .count();
        let joint_superfan_ratio = round4(joint_count as f64 / rated.len() as f64);

        let segmentation = MarketSegmentation::from_survey(&survey, superfan_ratio);
        let target_market_size = round2(segmentation.superfans_pct + segmentation.enthusiasts_pct);

        let recommendation = Recommendation::select(
            superfan_ratio,
            segmentation.enthusiasts_pct,
            segmentation.interested_pct,
        );
        let business_model = BusinessModel::select(superfan_ratio, segmentation.enthusiasts_pct);

        let interest_distribution = (1..=5u8).map(|l| (l, survey.interest.at(l))).collect();

        let top_benefits = rank_items(
            rated.iter().map(|r| r.response.main_benefit.as_str()),
            TOP_ITEMS,
        );
        let top_concerns = rank_items(
            rated
                .iter()
                .flat_map(|r| r.response.concerns.iter().map(String::as_str)),
            TOP_ITEMS,
        );

        let statistically_reliable = rated.len() >= MIN_RELIABLE_RESPONDENTS;
        if !statistically_reliable {
            warn!(
                respondents = rated.len(),
                "Fewer than {} rated respondents, score is not statistically reliable",
                MIN_RELIABLE_RESPONDENTS
            );
        }

        let score = MarketFitScore {
            fit_score,
            avg_interest: round2(survey.interest.expected_value()),
            avg_purchase_intent: round2(survey.purchase_intent.expected_value()),
            nps,
            segmentation,
            target_market_size,
            superfan_ratio,
            joint_superfan_ratio,
            interest_distribution,
            survey,
            top_benefits,
            top_concerns,
            recommendation,
            business_model,
            total_respondents: rated.len(),
            skipped_respondents: skipped,
            statistically_reliable,
        };

        debug!(
            fit = score.fit_score,
            nps = score.nps,
            superfan_ratio = score.superfan_ratio,
            "Aggregated market fit"
        );
        Ok(score)
    }
}

// =============================================================================
// Scorer
// =============================================================================

/// Score plus the per-respondent ratings it was built from
#[derive(Debug, Clone)]
pub struct ScoredResponses {
    pub score: MarketFitScore,
    pub rated: Vec<RatedResponse>,
}

/// Turns one iteration's responses into a score
#[async_trait]
pub trait FitScorer: Send + Sync {
    async fn score(&self, responses: Vec<PersonaResponse>) -> Result<ScoredResponses>;
}

/// SSR-backed scorer. Reference phrases are embedded on first use and reused
/// for the rest of the run.
pub struct SsrFitScorer {
    converter: RatingConverter,
    scales: Vec<RatingScale>,
    calibrated: OnceCell<Vec<CalibratedScale>>,
}

impl SsrFitScorer {
    pub fn new(converter: RatingConverter, scales: Vec<RatingScale>) -> Result<Self> {
        for dimension in Dimension::ALL {
            if !scales.iter().any(|s| s.dimension == dimension) {
                return Err(MarketError::Config(format!(
                    "no rating scale configured for {}",
                    dimension
                )));
            }
        }
        Ok(Self {
            converter,
            scales,
            calibrated: OnceCell::new(),
        })
    }

    async fn calibrated(&self) -> Result<&[CalibratedScale]> {
        let scales = self
            .calibrated
            .get_or_try_init(|| async {
                let mut out = Vec::with_capacity(self.scales.len());
                for scale in &self.scales {
                    out.push(self.converter.calibrate(scale).await?);
                }
                info!("Calibrated {} rating scales", out.len());
                Ok::<_, MarketError>(out)
            })
            .await?;
        Ok(scales)
    }

    /// Rate all four dimensions of one response
    pub async fn rate(&self, response: &PersonaResponse) -> Result<RespondentRatings> {
        let scales = self.calibrated().await?;
        let mut pmfs = [Pmf::uniform(); 4];
        for (slot, dimension) in pmfs.iter_mut().zip(Dimension::ALL) {
            let scale = scales
                .iter()
                .find(|s| s.dimension() == dimension)
                .ok_or_else(|| MarketError::rating(dimension.as_str(), "scale not calibrated"))?;
            *slot = self
                .converter
                .convert(scale, response.text_for(dimension))
                .await?;
        }
        let [interest, purchase_intent, disappointment, recommendation] = pmfs;
        Ok(RespondentRatings {
            interest,
            purchase_intent,
            disappointment,
            recommendation,
        })
    }
}

#[async_trait]
impl FitScorer for SsrFitScorer {
    async fn score(&self, responses: Vec<PersonaResponse>) -> Result<ScoredResponses> {
        if responses.is_empty() {
            return Err(MarketError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        // Calibration failure is fatal for the batch, not per respondent
        self.calibrated().await?;

        let mut rated = Vec::with_capacity(responses.len());
        let mut skipped = 0;
        for response in responses {
            match self.rate(&response).await {
                Ok(ratings) => rated.push(RatedResponse { response, ratings }),
                Err(e) => {
                    warn!(persona = %response.persona_name, "Skipping respondent: {}", e);
                    skipped += 1;
                }
            }
        }

        let score = FitAggregator::aggregate(&rated, skipped)?;
        Ok(ScoredResponses { score, rated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssr::default_scales;
    use crate::test_support::{KeywordEmbedder, response};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn rated(name: &str, ratings: RespondentRatings) -> RatedResponse {
        RatedResponse {
            response: response(name),
            ratings,
        }
    }

    fn population(n: usize, pmf: Pmf) -> Vec<RatedResponse> {
        (0..n)
            .map(|i| rated(&format!("p{}", i), RespondentRatings::uniform_across(pmf)))
            .collect()
    }

    #[test]
    fn test_empty_input_is_insufficient() {
        let err = FitAggregator::aggregate(&[], 0).unwrap_err();
        assert!(matches!(
            err,
            MarketError::InsufficientData {
                required: 1,
                actual: 0
            }
        ));
    }

    #[test]
    fn test_perfect_population() {
        let score = FitAggregator::aggregate(&population(10, Pmf::point(5)), 0).unwrap();
        assert_eq!(score.fit_score, 100.0);
        assert_eq!(score.nps, 100);
        assert_eq!(score.superfan_ratio, 1.0);
        assert_eq!(score.joint_superfan_ratio, 1.0);
        assert_eq!(score.avg_interest, 5.0);
        assert_eq!(score.segmentation.superfans_pct, 100.0);
        assert_eq!(score.target_market_size, 200.0);
        assert_eq!(score.recommendation, Recommendation::ProceedMassMarket);
        assert_eq!(score.business_model, BusinessModel::FreemiumMassMarket);
        assert!(score.statistically_reliable);
    }

    #[test]
    fn test_uniform_population() {
        let score = FitAggregator::aggregate(&population(10, Pmf::uniform()), 0).unwrap();
        assert_eq!(score.fit_score, 40.0);
        assert_eq!(score.nps, -40);
        assert_eq!(score.avg_interest, 3.0);
        assert_eq!(score.superfan_ratio, 0.08);
        assert_eq!(score.segmentation.enthusiasts_pct, 40.0);
        assert_eq!(score.segmentation.interested_pct, 20.0);
        assert_eq!(score.segmentation.skeptical_pct, 40.0);
        assert_eq!(score.segmentation.promoters_pct, 20.0);
        assert_eq!(score.segmentation.passives_pct, 20.0);
        assert_eq!(score.segmentation.detractors_pct, 60.0);
        assert_eq!(score.joint_superfan_ratio, 0.0);
        assert_eq!(score.recommendation, Recommendation::RefineModerateInterest);
        assert_eq!(score.business_model, BusinessModel::MidMarketSaas);
    }

    #[test]
    fn test_small_population_flagged_unreliable() {
        let score = FitAggregator::aggregate(&population(3, Pmf::uniform()), 2).unwrap();
        assert!(!score.statistically_reliable);
        assert_eq!(score.total_respondents, 3);
        assert_eq!(score.skipped_respondents, 2);
    }

    #[test]
    fn test_recommendation_table() {
        use Recommendation::*;
        assert_eq!(Recommendation::select(0.10, 40.0, 0.0), ProceedMassMarket);
        assert_eq!(Recommendation::select(0.12, 39.9, 0.0), ProceedNiche);
        assert_eq!(Recommendation::select(0.05, 30.0, 0.0), RefineModerateInterest);
        assert_eq!(Recommendation::select(0.05, 20.0, 50.0), RefineLukewarm);
        assert_eq!(Recommendation::select(0.05, 20.0, 49.0), Pivot);
        assert!(ProceedNiche.to_string().starts_with("PROCEED (NICHE)"));
        assert!(Pivot.to_string().starts_with("PIVOT"));
    }

    #[test]
    fn test_business_model_table() {
        use BusinessModel::*;
        assert_eq!(BusinessModel::select(0.15, 40.0), FreemiumMassMarket);
        assert_eq!(BusinessModel::select(0.20, 10.0), PremiumNiche);
        assert_eq!(BusinessModel::select(0.10, 45.0), ValueBasedPricing);
        assert_eq!(BusinessModel::select(0.10, 35.0), PremiumCommunity);
        assert_eq!(BusinessModel::select(0.01, 30.0), MidMarketSaas);
        assert_eq!(BusinessModel::select(0.01, 29.9), NeedsRefinement);
    }

    #[test]
    fn test_top_items_ranked_by_frequency_then_first_seen() {
        let items = ["b", "a", " a ", "c", "b", "", "d", "e", "f"];
        let ranked = rank_items(items.iter().copied(), 5);
        let texts: Vec<&str> = ranked.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "a", "c", "d", "e"]);
        assert_eq!(ranked[0].count, 2);
    }

    #[test]
    fn test_items_compared_literally_after_trimming() {
        let items = ["Price", "price", " Price ", "Price.", "   "];
        let ranked = rank_items(items.iter().copied(), 5);
        let counts: Vec<(&str, usize)> =
            ranked.iter().map(|r| (r.text.as_str(), r.count)).collect();
        assert_eq!(counts, vec![("Price", 2), ("price", 1), ("Price.", 1)]);
    }

    #[test]
    fn test_benefits_and_concerns_collected() {
        let mut first = rated("a", RespondentRatings::uniform_across(Pmf::uniform()));
        first.response.main_benefit = "Saves time".into();
        first.response.concerns = vec!["Price".into(), "Privacy".into()];
        let mut second = first.clone();
        second.response.concerns = vec!["Price".into()];

        let score = FitAggregator::aggregate(&[first, second], 0).unwrap();
        assert_eq!(score.top_benefits[0].text, "Saves time");
        assert_eq!(score.top_benefits[0].count, 2);
        assert_eq!(score.top_concerns[0].text, "Price");
        assert_eq!(score.top_concerns[1].text, "Privacy");
    }

    #[test]
    fn test_joint_ratio_counts_individuals() {
        let fan = RespondentRatings {
            interest: Pmf::point(5),
            purchase_intent: Pmf::point(4),
            disappointment: Pmf::point(4),
            recommendation: Pmf::point(5),
        };
        let mut input = population(3, Pmf::uniform());
        input.push(rated("fan", fan));
        let score = FitAggregator::aggregate(&input, 0).unwrap();
        assert_eq!(score.joint_superfan_ratio, 0.25);
    }

    #[test]
    fn test_prompt_context_mentions_metrics() {
        let score = FitAggregator::aggregate(&population(10, Pmf::uniform()), 0).unwrap();
        let context = score.to_prompt_context();
        assert!(context.contains("Fit score: 40.0%"));
        assert!(context.contains("NPS: -40"));
        assert!(score.meets_threshold(40.0));
        assert!(!score.meets_threshold(40.1));
    }

    #[tokio::test]
    async fn test_ssr_scorer_rates_and_aggregates() {
        let converter = RatingConverter::new(Arc::new(KeywordEmbedder), 1.0, 0.01).unwrap();
        let scorer = SsrFitScorer::new(converter, default_scales()).unwrap();

        let mut responses: Vec<PersonaResponse> = (0..4).map(|i| response(&format!("p{}", i))).collect();
        responses[1].interest_response = String::new();

        let scored = scorer.score(responses).await.unwrap();
        assert_eq!(scored.rated.len(), 3);
        assert_eq!(scored.score.total_respondents, 3);
        assert_eq!(scored.score.skipped_respondents, 1);
    }

    #[tokio::test]
    async fn test_ssr_scorer_rejects_empty() {
        let converter = RatingConverter::new(Arc::new(KeywordEmbedder), 1.0, 0.01).unwrap();
        let scorer = SsrFitScorer::new(converter, default_scales()).unwrap();
        assert!(matches!(
            scorer.score(Vec::new()).await,
            Err(MarketError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_scorer_requires_every_dimension() {
        let converter = RatingConverter::new(Arc::new(KeywordEmbedder), 1.0, 0.01).unwrap();
        let mut scales = default_scales();
        scales.pop();
        assert!(SsrFitScorer::new(converter, scales).is_err());
    }

    fn arb_pmf() -> impl Strategy<Value = Pmf> {
        prop::array::uniform5(0.001f64..1.0).prop_map(|raw| {
            let total: f64 = raw.iter().sum();
            Pmf::new(raw.map(|v| v / total)).unwrap_or_else(|_| Pmf::uniform())
        })
    }

    fn arb_ratings() -> impl Strategy<Value = RespondentRatings> {
        (arb_pmf(), arb_pmf(), arb_pmf(), arb_pmf()).prop_map(|(i, p, d, r)| RespondentRatings {
            interest: i,
            purchase_intent: p,
            disappointment: d,
            recommendation: r,
        })
    }

    proptest! {
        #[test]
        fn prop_segment_triples_sum_to_100(ratings in prop::collection::vec(arb_ratings(), 1..20)) {
            let input: Vec<_> = ratings.into_iter().map(|r| rated("x", r)).collect();
            let seg = FitAggregator::aggregate(&input, 0).unwrap().segmentation;
            prop_assert!((seg.enthusiasts_pct + seg.interested_pct + seg.skeptical_pct - 100.0).abs() <= 1.0);
            prop_assert!((seg.very_disappointed_pct + seg.somewhat_disappointed_pct + seg.not_disappointed_pct - 100.0).abs() <= 1.0);
            prop_assert!((seg.promoters_pct + seg.passives_pct + seg.detractors_pct - 100.0).abs() <= 1.0);
        }

        #[test]
        fn prop_aggregation_is_idempotent(ratings in prop::collection::vec(arb_ratings(), 1..20)) {
            let input: Vec<_> = ratings.into_iter().map(|r| rated("x", r)).collect();
            let first = FitAggregator::aggregate(&input, 0).unwrap();
            let second = FitAggregator::aggregate(&input, 0).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_more_top_disappointment_never_lowers_fit(
            ratings in prop::collection::vec(arb_ratings(), 1..20),
            shift in 0.0f64..1.0,
        ) {
            let input: Vec<_> = ratings.into_iter().map(|r| rated("x", r)).collect();
            let before = FitAggregator::aggregate(&input, 0).unwrap();

            // move a share of the level-1..3 mass to level 5
            let raised: Vec<_> = input
                .iter()
                .map(|r| {
                    let mut out = r.clone();
                    let v = *r.ratings.disappointment.values();
                    let moved: f64 = (v[0] + v[1] + v[2]) * shift;
                    let keep = 1.0 - shift;
                    let new = [v[0] * keep, v[1] * keep, v[2] * keep, v[3], v[4] + moved];
                    out.ratings.disappointment = Pmf::new(new).unwrap_or(r.ratings.disappointment);
                    out
                })
                .collect();
            let after = FitAggregator::aggregate(&raised, 0).unwrap();
            prop_assert!(after.fit_score >= before.fit_score);
        }
    }
}
