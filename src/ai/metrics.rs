//! Provider Call Metrics
//!
//! Tracks calls, failures, retries and token usage per operation across a
//! run. Thread-safe for concurrent simulation workers.
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = CallMetrics::shared();
//! metrics.record_success("complete", &usage, elapsed);
//! println!("{}", metrics.summary().display());
//! ```

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::ai::provider::TokenUsage;

/// Counters for one operation (e.g. `complete`, `complete_text`, `embed`)
#[derive(Debug, Default)]
struct OperationCounters {
    calls: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    latency_ms: AtomicU64,
}

/// Snapshot of one operation's counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationStats {
    pub operation: String,
    pub calls: u64,
    pub failures: u64,
    pub retries: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub avg_latency_ms: f64,
}

/// Summary statistics for a run
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_duration_ms: u64,
    pub calls: u64,
    pub failures: u64,
    pub retries: u64,
    pub total_tokens: u64,
    pub operations: Vec<OperationStats>,
}

/// Thread-safe call metrics.
///
/// DashMap shards per-operation entries so concurrent workers rarely contend.
pub struct CallMetrics {
    start_time: Instant,
    operations: DashMap<String, OperationCounters>,
}

/// Shared metrics handle
pub type SharedMetrics = Arc<CallMetrics>;

impl Default for CallMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CallMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            operations: DashMap::new(),
        }
    }

    pub fn shared() -> SharedMetrics {
        Arc::new(Self::new())
    }

    fn with_counters(&self, operation: &str, f: impl FnOnce(&OperationCounters)) {
        if let Some(counters) = self.operations.get(operation) {
            f(&counters);
            return;
        }
        let entry = self.operations.entry(operation.to_string()).or_default();
        f(&entry);
    }

    /// Record a completed call
    pub fn record_success(&self, operation: &str, usage: &TokenUsage, latency: Duration) {
        self.with_counters(operation, |c| {
            c.calls.fetch_add(1, Ordering::Relaxed);
            c.input_tokens
                .fetch_add(u64::from(usage.input_tokens), Ordering::Relaxed);
            c.output_tokens
                .fetch_add(u64::from(usage.output_tokens), Ordering::Relaxed);
            c.latency_ms
                .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
        });
    }

    /// Record a call that failed after exhausting retries
    pub fn record_failure(&self, operation: &str) {
        self.with_counters(operation, |c| {
            c.calls.fetch_add(1, Ordering::Relaxed);
            c.failures.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Record one retry of a failed attempt
    pub fn record_retry(&self, operation: &str) {
        self.with_counters(operation, |c| {
            c.retries.fetch_add(1, Ordering::Relaxed);
        });
    }

    pub fn operation(&self, operation: &str) -> Option<OperationStats> {
        self.operations
            .get(operation)
            .map(|c| snapshot(operation, &c))
    }

    pub fn summary(&self) -> MetricsSummary {
        let mut operations: Vec<OperationStats> = self
            .operations
            .iter()
            .map(|entry| snapshot(entry.key(), entry.value()))
            .collect();
        operations.sort_by(|a, b| a.operation.cmp(&b.operation));

        MetricsSummary {
            total_duration_ms: self.start_time.elapsed().as_millis() as u64,
            calls: operations.iter().map(|o| o.calls).sum(),
            failures: operations.iter().map(|o| o.failures).sum(),
            retries: operations.iter().map(|o| o.retries).sum(),
            total_tokens: operations
                .iter()
                .map(|o| o.input_tokens + o.output_tokens)
                .sum(),
            operations,
        }
    }
}

fn snapshot(operation: &str, c: &OperationCounters) -> OperationStats {
    let calls = c.calls.load(Ordering::Relaxed);
    let failures = c.failures.load(Ordering::Relaxed);
    let succeeded = calls.saturating_sub(failures);
    let latency = c.latency_ms.load(Ordering::Relaxed);
    OperationStats {
        operation: operation.to_string(),
        calls,
        failures,
        retries: c.retries.load(Ordering::Relaxed),
        input_tokens: c.input_tokens.load(Ordering::Relaxed),
        output_tokens: c.output_tokens.load(Ordering::Relaxed),
        avg_latency_ms: if succeeded > 0 {
            latency as f64 / succeeded as f64
        } else {
            0.0
        },
    }
}

impl MetricsSummary {
    /// Format summary for display
    pub fn display(&self) -> String {
        let mut out = format!(
            "Duration: {:.1}s\nAPI Calls: {} ({} failed, {} retries)\nTokens: {}",
            self.total_duration_ms as f64 / 1000.0,
            self.calls,
            self.failures,
            self.retries,
            self.total_tokens
        );
        for op in &self.operations {
            out.push_str(&format!(
                "\n  {}: {} calls, avg {:.0}ms",
                op.operation, op.calls, op.avg_latency_ms
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u32, output: u32) -> TokenUsage {
        TokenUsage {
            input_tokens: input,
            output_tokens: output,
        }
    }

    #[test]
    fn test_record_per_operation() {
        let metrics = CallMetrics::new();
        metrics.record_success("complete", &usage(100, 50), Duration::from_millis(400));
        metrics.record_success("complete", &usage(10, 5), Duration::from_millis(200));
        metrics.record_retry("complete");
        metrics.record_failure("complete_text");

        let complete = metrics.operation("complete").unwrap();
        assert_eq!(complete.calls, 2);
        assert_eq!(complete.retries, 1);
        assert_eq!(complete.input_tokens, 110);
        assert!((complete.avg_latency_ms - 300.0).abs() < 1e-9);

        let summary = metrics.summary();
        assert_eq!(summary.calls, 3);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.total_tokens, 165);
        assert_eq!(summary.operations[0].operation, "complete");
    }

    #[test]
    fn test_concurrent_recording() {
        use std::thread;

        let metrics = CallMetrics::shared();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.record_success("complete", &usage(10, 5), Duration::from_millis(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = metrics.summary();
        assert_eq!(summary.calls, 800);
        assert_eq!(summary.total_tokens, 12_000);
    }

    #[test]
    fn test_summary_display() {
        let metrics = CallMetrics::new();
        metrics.record_success("embed", &usage(7, 0), Duration::from_millis(20));
        let display = metrics.summary().display();
        assert!(display.contains("API Calls: 1"));
        assert!(display.contains("embed: 1 calls"));
    }
}
