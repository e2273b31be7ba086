//! Progress reporting
//!
//! The workflow core never prints. It notifies an injected observer at fixed
//! points; the CLI subscribes through a broadcast channel and renders.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::Stage;

/// Events emitted during a run
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    StageStarted {
        iteration: usize,
        stage: Stage,
    },
    PersonaBatchFailed {
        batch: usize,
        consecutive: usize,
        reason: String,
    },
    FallbackActivated {
        shortfall: usize,
    },
    PopulationReady {
        size: usize,
        diversity: f64,
        used_fallback: bool,
    },
    PersonaSkipped {
        persona: String,
        reason: String,
    },
    IterationCompleted {
        iteration: usize,
        concept: String,
        fit_score: f64,
        nps: i32,
    },
    RunFinished {
        iterations: usize,
        fit_score: Option<f64>,
        met_threshold: bool,
    },
}

pub trait ProgressObserver: Send + Sync {
    fn notify(&self, event: &ProgressEvent);
}

pub type SharedObserver = Arc<dyn ProgressObserver>;

/// Writes events as log lines
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn notify(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StageStarted { iteration, stage } => {
                info!(iteration, "Stage: {}", stage)
            }
            ProgressEvent::PersonaBatchFailed {
                batch,
                consecutive,
                reason,
            } => warn!(batch, consecutive, "Persona batch failed: {}", reason),
            ProgressEvent::FallbackActivated { shortfall } => {
                warn!(shortfall, "Falling back to unconstrained persona generation")
            }
            ProgressEvent::PopulationReady {
                size,
                diversity,
                used_fallback,
            } => info!(
                size,
                used_fallback, "Population ready (diversity {:.1})", diversity
            ),
            ProgressEvent::PersonaSkipped { persona, reason } => {
                warn!(persona = %persona, "Skipped persona: {}", reason)
            }
            ProgressEvent::IterationCompleted {
                iteration,
                concept,
                fit_score,
                nps,
            } => info!(
                iteration,
                nps, "{}: fit {:.1}%", concept, fit_score
            ),
            ProgressEvent::RunFinished {
                iterations,
                fit_score,
                met_threshold,
            } => info!(
                iterations,
                met_threshold, "Run finished (final fit {:?})", fit_score
            ),
        }
    }
}

/// Fans events out to any number of subscribers
pub struct BroadcastObserver {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl ProgressObserver for BroadcastObserver {
    /// Silently discards when nobody is listening
    fn notify(&self, event: &ProgressEvent) {
        let _ = self.sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let observer = BroadcastObserver::new(16);
        let mut rx = observer.subscribe();

        observer.notify(&ProgressEvent::FallbackActivated { shortfall: 3 });
        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::FallbackActivated { shortfall: 3 }
        );
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let observer = BroadcastObserver::new(1);
        observer.notify(&ProgressEvent::StageStarted {
            iteration: 0,
            stage: Stage::PopulateOnce,
        });
    }
}
