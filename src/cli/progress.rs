//! Console rendering of workflow progress
//!
//! Subscribes to a `BroadcastObserver` and prints one styled line per event
//! until the channel closes.

use console::style;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::workflow::{BroadcastObserver, ProgressEvent, Stage};

pub struct ConsoleRenderer {
    receiver: broadcast::Receiver<ProgressEvent>,
    verbose: bool,
}

impl ConsoleRenderer {
    pub fn new(observer: &BroadcastObserver) -> Self {
        Self {
            receiver: observer.subscribe(),
            verbose: false,
        }
    }

    /// Also print per-persona skips and batch failures
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Spawn rendering task; it ends when every sender is dropped
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.receiver.recv().await {
                    Ok(event) => {
                        if let Some(line) = render_event(&event, self.verbose) {
                            println!("{}", line);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        println!("{} {} progress events dropped", style("…").dim(), missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// One console line per event, or `None` for events not worth showing
pub fn render_event(event: &ProgressEvent, verbose: bool) -> Option<String> {
    match event {
        ProgressEvent::StageStarted { iteration, stage } => match stage {
            Stage::PopulateOnce => Some(format!("{} Building population", style("▸").cyan())),
            Stage::Ideate if *iteration == 0 => {
                Some(format!("{} Generating initial concept", style("▸").cyan()))
            }
            Stage::Ideate => Some(format!(
                "{} Refining concept (iteration {})",
                style("▸").cyan(),
                iteration + 1
            )),
            Stage::Simulate => Some(format!("  {} simulating market", style("·").dim())),
            _ => None,
        },
        ProgressEvent::PersonaBatchFailed {
            batch,
            consecutive,
            reason,
        } if verbose => Some(format!(
            "  {} persona batch {} failed ({} in a row): {}",
            style("⚠").yellow(),
            batch,
            consecutive,
            reason
        )),
        ProgressEvent::PersonaBatchFailed { .. } => None,
        ProgressEvent::FallbackActivated { shortfall } => Some(format!(
            "  {} stratified generation gave up; generating {} personas without quotas",
            style("⚠").yellow(),
            shortfall
        )),
        ProgressEvent::PopulationReady {
            size,
            diversity,
            used_fallback,
        } => Some(format!(
            "  {} {} personas, diversity {:.1}{}",
            style("✓").green(),
            size,
            diversity,
            if *used_fallback { " (fallback)" } else { "" }
        )),
        ProgressEvent::PersonaSkipped { persona, reason } if verbose => Some(format!(
            "  {} skipped {}: {}",
            style("⚠").yellow(),
            persona,
            reason
        )),
        ProgressEvent::PersonaSkipped { .. } => None,
        ProgressEvent::IterationCompleted {
            iteration,
            concept,
            fit_score,
            nps,
        } => Some(format!(
            "  {} [{}] {}: fit {}% | NPS {}",
            style("✓").green(),
            iteration,
            style(concept).bold(),
            style(format!("{:.1}", fit_score)).bold(),
            nps
        )),
        ProgressEvent::RunFinished {
            iterations,
            fit_score,
            met_threshold,
        } => {
            let fit = fit_score
                .map(|f| format!("{:.1}%", f))
                .unwrap_or_else(|| "n/a".to_string());
            let marker = if *met_threshold {
                style("✓").green()
            } else {
                style("✗").yellow()
            };
            Some(format!(
                "{} Finished after {} iteration(s), final fit {}",
                marker, iterations, fit
            ))
        }
    }
}
