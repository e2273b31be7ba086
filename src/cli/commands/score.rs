//! Score Command
//!
//! Scores a saved set of persona responses without running the loop. The
//! input is either a bare JSON array of responses or a run state file with a
//! `responses` field.

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::run::load_config;
use crate::ai::metrics::CallMetrics;
use crate::ai::{create_embedder, create_limiter};
use crate::cli::ui::Output;
use crate::market::{FitScorer, SsrFitScorer};
use crate::ssr::{RatingConverter, default_scales};
use crate::types::{MarketError, PersonaResponse, Result};

#[derive(Debug, Clone)]
pub struct ScoreOptions {
    pub responses: PathBuf,
    pub config_path: Option<PathBuf>,
    pub format: String,
}

pub async fn run(options: ScoreOptions) -> Result<()> {
    let config = load_config(options.config_path.as_deref())?;
    let responses = read_responses(&options.responses)?;

    let embedder = create_embedder(&config, create_limiter(&config), CallMetrics::shared())?;
    let converter = RatingConverter::new(embedder, config.ssr.temperature, config.ssr.epsilon)?;
    let scored = SsrFitScorer::new(converter, default_scales())?
        .score(responses)
        .await?;

    match options.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&scored.score)?),
        _ => Output::new().score(&scored.score, config.workflow.fit_threshold),
    }
    Ok(())
}

pub fn read_responses(path: &Path) -> Result<Vec<PersonaResponse>> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    let records = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove("responses").ok_or_else(|| {
            MarketError::invalid_record("responses", "object has no 'responses' field")
        })?,
        _ => {
            return Err(MarketError::invalid_record(
                "responses",
                "expected an array or a run state object",
            ));
        }
    };
    Ok(serde_json::from_value(records)?)
}
