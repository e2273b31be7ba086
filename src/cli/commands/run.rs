//! Run Command
//!
//! Drives the refinement loop against the configured HTTP providers, renders
//! progress to the console and writes the final state as JSON. Ctrl-C cancels
//! the run; whatever was committed before the interrupt is still written.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ai::metrics::CallMetrics;
use crate::ai::{create_embedder, create_limiter};
use crate::cli::progress::ConsoleRenderer;
use crate::cli::ui::Output;
use crate::config::{Config, ConfigLoader};
use crate::market::SsrFitScorer;
use crate::ssr::{RatingConverter, default_scales};
use crate::types::{MarketError, Result};
use crate::workflow::{
    AgentProviders, BroadcastObserver, RefinementController, RunParameters, WorkflowState,
};

const PROGRESS_CAPACITY: usize = 256;

/// Command-line overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub seed_idea: String,
    pub config_path: Option<PathBuf>,
    pub max_iterations: Option<usize>,
    pub fit_threshold: Option<f64>,
    pub population_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

impl RunOptions {
    fn apply(&self, config: &mut Config) {
        if let Some(n) = self.max_iterations {
            config.workflow.max_iterations = n;
        }
        if let Some(t) = self.fit_threshold {
            config.workflow.fit_threshold = t;
        }
        if let Some(n) = self.population_size {
            config.workflow.population_size = n;
        }
        if let Some(n) = self.concurrency {
            config.workflow.simulation_concurrency = n;
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

pub async fn run(options: RunOptions) -> Result<()> {
    let mut config = load_config(options.config_path.as_deref())?;
    options.apply(&mut config);
    config.validate()?;

    let params = RunParameters::from_config(&config, options.seed_idea.clone());
    params.validate()?;

    // completions and embeddings count against one call budget
    let metrics = CallMetrics::shared();
    let limiter = create_limiter(&config);
    let providers = AgentProviders::from_config(&config, limiter.clone(), metrics.clone())?;
    let embedder = create_embedder(&config, limiter, metrics.clone())?;
    let converter = RatingConverter::new(embedder, config.ssr.temperature, config.ssr.epsilon)?;
    let scorer = SsrFitScorer::new(converter, default_scales())?;

    let observer = Arc::new(BroadcastObserver::new(PROGRESS_CAPACITY));
    let renderer = ConsoleRenderer::new(&observer)
        .with_verbose(options.verbose)
        .spawn();

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            interrupt.cancel();
        }
    });

    let out = Output::new();
    out.header(&format!("marketfit: {}", params.seed_idea));

    let controller = RefinementController::new(providers, Arc::new(scorer), observer);
    let mut state = WorkflowState::new(&params);
    let outcome = controller.drive(&params, &mut state, &cancel).await;

    // closing the channel ends the renderer
    drop(controller);
    if let Err(e) = renderer.await {
        warn!("Progress renderer stopped abnormally: {}", e);
    }

    let path = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&state));
    write_state(&state, &path)?;

    if let Some(concept) = &state.concept {
        out.concept(concept);
    }
    if let Some(score) = &state.score {
        out.score(score, params.fit_threshold);
    }
    out.history(&state.history);
    if let Some(best) = state.best_iteration() {
        out.info(&format!(
            "Best iteration: {} ({}) at {:.1}%",
            best.iteration, best.concept_name, best.fit_score
        ));
    }
    out.section("API usage");
    println!("{}", metrics.summary().display());
    out.success(&format!("State written to {}", path.display()));

    match outcome {
        Ok(()) => {
            if !state.met_threshold() {
                out.warning(&format!(
                    "Fit threshold {:.1}% not reached within {} iterations",
                    params.fit_threshold, params.max_iterations
                ));
            }
            Ok(())
        }
        Err(MarketError::Cancelled(reason)) => {
            out.warning(&format!("Run cancelled: {}", reason));
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Persist the workflow state as pretty JSON, creating parent directories
pub fn write_state(state: &WorkflowState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(state)?)?;
    info!("Wrote run state to {}", path.display());
    Ok(())
}

fn default_output_path(state: &WorkflowState) -> PathBuf {
    let name = state
        .concept
        .as_ref()
        .map(|c| c.name.as_str())
        .unwrap_or("run");
    ConfigLoader::project_dir()
        .join("runs")
        .join(output_file_name(name, state.started_at))
}

/// `<slug>-<timestamp>.json`, e.g. `mealmate-plus-20260101-120000.json`
fn output_file_name(concept_name: &str, started_at: DateTime<Utc>) -> String {
    static NON_SLUG: OnceLock<Regex> = OnceLock::new();
    let pattern = NON_SLUG.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap());

    let lower = concept_name.to_lowercase();
    let slug = pattern.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "run" } else { slug };
    format!("{}-{}.json", slug, started_at.format("%Y%m%d-%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_output_file_name() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            output_file_name("MealMate Plus!", at),
            "mealmate-plus-20260102-030405.json"
        );
        assert_eq!(output_file_name("???", at), "run-20260102-030405.json");
    }

    #[test]
    fn test_options_override_config() {
        let mut config = Config::default();
        let options = RunOptions {
            seed_idea: "x".to_string(),
            max_iterations: Some(2),
            population_size: Some(20),
            ..RunOptions::default()
        };
        options.apply(&mut config);
        assert_eq!(config.workflow.max_iterations, 2);
        assert_eq!(config.workflow.population_size, 20);
        assert_eq!(config.workflow.fit_threshold, 40.0);
    }

    #[test]
    fn test_write_state_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs").join("state.json");
        let config = Config::default();
        let state = WorkflowState::new(&RunParameters::from_config(&config, "idea"));

        write_state(&state, &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["iteration"], 0);
        assert_eq!(value["run_id"], state.run_id.to_string());
    }
}
