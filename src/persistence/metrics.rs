// Copyright 2025 Cowboy AI, LLC.

//! Metrics collection for store operations
//!
//! Operations are keyed by name (`store.commit`, `store.load_initiative`, ...).
//! Each operation gets a call counter, an error counter and a bounded window
//! of recent durations. Optimistic-concurrency conflicts are counted apart
//! from other errors so contention is visible on its own.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::errors::WorkflowError;

const DEFAULT_WINDOW: usize = 1000;

#[derive(Debug, Default)]
struct OperationMetrics {
    calls: u64,
    errors: u64,
    conflicts: u64,
    durations: Vec<Duration>,
}

/// Shared metrics collector; clones observe the same counters
#[derive(Debug, Clone)]
pub struct PersistenceMetrics {
    operations: Arc<RwLock<HashMap<String, OperationMetrics>>>,
    window: usize,
}

impl Default for PersistenceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceMetrics {
    /// Collector keeping the last 1000 durations per operation
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Collector keeping the last `window` durations per operation
    pub fn with_window(window: usize) -> Self {
        Self {
            operations: Arc::new(RwLock::new(HashMap::new())),
            window: window.max(1),
        }
    }

    /// Start timing `operation`
    pub fn timer(&self, operation: &str) -> MetricsTimer<'_> {
        MetricsTimer {
            metrics: self,
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    /// Record one finished call
    pub async fn record(&self, operation: &str, duration: Duration, error: Option<&WorkflowError>) {
        let mut operations = self.operations.write().await;
        let op = operations.entry(operation.to_string()).or_default();
        op.calls += 1;
        match error {
            Some(e) if e.is_concurrency_error() => op.conflicts += 1,
            Some(_) => op.errors += 1,
            None => {}
        }
        op.durations.push(duration);
        if op.durations.len() > self.window {
            let excess = op.durations.len() - self.window;
            op.durations.drain(..excess);
        }
    }

    /// Calls recorded for `operation`
    pub async fn calls(&self, operation: &str) -> u64 {
        self.read(operation, |op| op.calls).await
    }

    /// Failures other than conflicts recorded for `operation`
    pub async fn errors(&self, operation: &str) -> u64 {
        self.read(operation, |op| op.errors).await
    }

    /// Concurrency conflicts recorded for `operation`
    pub async fn conflicts(&self, operation: &str) -> u64 {
        self.read(operation, |op| op.conflicts).await
    }

    /// Mean duration over the window
    pub async fn avg_duration(&self, operation: &str) -> Option<Duration> {
        let operations = self.operations.read().await;
        let durations = &operations.get(operation)?.durations;
        if durations.is_empty() {
            return None;
        }
        Some(durations.iter().sum::<Duration>() / durations.len() as u32)
    }

    /// Duration at `percentile` (0-100) over the window
    pub async fn percentile_duration(&self, operation: &str, percentile: f64) -> Option<Duration> {
        let operations = self.operations.read().await;
        let mut sorted = operations.get(operation)?.durations.clone();
        sorted.sort();
        pick(&sorted, percentile)
    }

    /// Snapshot of every operation
    pub async fn summary(&self) -> MetricsSummary {
        let operations = self.operations.read().await;
        let mut summary = MetricsSummary::default();

        for (name, op) in operations.iter() {
            summary.calls.insert(name.clone(), op.calls);
            summary.errors.insert(name.clone(), op.errors);
            summary.conflicts.insert(name.clone(), op.conflicts);

            let mut sorted = op.durations.clone();
            sorted.sort();
            if let (Some(min), Some(max), Some(p50), Some(p95), Some(p99)) = (
                sorted.first().copied(),
                sorted.last().copied(),
                pick(&sorted, 50.0),
                pick(&sorted, 95.0),
                pick(&sorted, 99.0),
            ) {
                summary.durations.insert(
                    name.clone(),
                    DurationStats {
                        count: sorted.len(),
                        avg: sorted.iter().sum::<Duration>() / sorted.len() as u32,
                        p50,
                        p95,
                        p99,
                        min,
                        max,
                    },
                );
            }
        }
        summary
    }

    /// Forget everything
    pub async fn reset(&self) {
        self.operations.write().await.clear();
    }

    async fn read(&self, operation: &str, f: impl Fn(&OperationMetrics) -> u64) -> u64 {
        self.operations.read().await.get(operation).map(f).unwrap_or(0)
    }
}

fn pick(sorted: &[Duration], percentile: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let clamped = percentile.clamp(0.0, 100.0);
    let index = ((sorted.len() - 1) as f64 * clamped / 100.0).round() as usize;
    sorted.get(index).copied()
}

/// Snapshot of all operations
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    /// Calls per operation
    pub calls: HashMap<String, u64>,
    /// Non-conflict failures per operation
    pub errors: HashMap<String, u64>,
    /// Concurrency conflicts per operation
    pub conflicts: HashMap<String, u64>,
    /// Duration statistics per operation
    pub durations: HashMap<String, DurationStats>,
}

/// Duration statistics for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationStats {
    /// Number of measurements
    pub count: usize,
    /// Average duration
    pub avg: Duration,
    /// 50th percentile
    pub p50: Duration,
    /// 95th percentile
    pub p95: Duration,
    /// 99th percentile
    pub p99: Duration,
    /// Minimum duration
    pub min: Duration,
    /// Maximum duration
    pub max: Duration,
}

/// Times one call from creation to `finish`
pub struct MetricsTimer<'a> {
    metrics: &'a PersistenceMetrics,
    operation: String,
    start: Instant,
}

impl MetricsTimer<'_> {
    /// Record the call, classifying `result`
    pub async fn finish<T>(self, result: &Result<T, WorkflowError>) {
        self.metrics
            .record(&self.operation, self.start.elapsed(), result.as_ref().err())
            .await;
    }
}
