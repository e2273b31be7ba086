//! Market fit engine
//!
//! - `aggregator`: ratings to population metrics, segmentation, decision tables
//! - `simulator`: bounded concurrent persona simulation and critic sampling

mod aggregator;
mod simulator;

pub use aggregator::{
    BusinessModel, FitAggregator, FitScorer, MarketFitScore, MarketSegmentation, RankedItem,
    RatedResponse, Recommendation, RespondentRatings, ScoredResponses, SsrFitScorer, SurveyPmfs,
};
pub use simulator::{
    MarketSimulator, SimulationOutcome, render_feedback_sample, select_feedback_sample,
};
