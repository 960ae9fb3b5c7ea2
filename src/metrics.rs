//! Performance metrics collection for LSP operations
//!
//! Lightweight in-memory counters and timing histograms for the feature
//! handlers and background workers, queryable for logging or diagnosis
//! without pulling in a full metrics-exporter stack.
//!
//! ## Design
//!
//! - Lock-free atomic counters for high-frequency operations
//! - DashMap for low-contention histogram storage
//! - Minimal overhead (~10-20ns per metric update)

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

/// Global metrics registry (singleton)
static METRICS: once_cell::sync::Lazy<Arc<Metrics>> = once_cell::sync::Lazy::new(|| {
    Arc::new(Metrics::new())
});

/// Get the global metrics instance
pub fn metrics() -> &'static Arc<Metrics> {
    &METRICS
}

/// Performance metrics registry
#[derive(Debug)]
pub struct Metrics {
    // Feature request counters
    completion_count: AtomicU64,
    definition_count: AtomicU64,
    document_symbol_count: AtomicU64,
    formatting_count: AtomicU64,

    // Timing histograms (operation name -> list of durations in microseconds)
    operation_timings: DashMap<String, Vec<u64>>,

    // Background worker stats
    parses_completed: AtomicU64,
    parse_errors: AtomicU64,
    diagnostics_published: AtomicU64,
    workspace_index_count: AtomicUsize,
    total_packages_indexed: AtomicUsize,
}

impl Metrics {
    /// Creates a new metrics registry
    pub fn new() -> Self {
        Self {
            completion_count: AtomicU64::new(0),
            definition_count: AtomicU64::new(0),
            document_symbol_count: AtomicU64::new(0),
            formatting_count: AtomicU64::new(0),
            operation_timings: DashMap::new(),
            parses_completed: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            diagnostics_published: AtomicU64::new(0),
            workspace_index_count: AtomicUsize::new(0),
            total_packages_indexed: AtomicUsize::new(0),
        }
    }

    pub fn record_completion(&self) {
        self.completion_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_definition(&self) {
        self.definition_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_document_symbol(&self) {
        self.document_symbol_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_formatting(&self) {
        self.formatting_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_completed(&self) {
        self.parses_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_diagnostics_published(&self) {
        self.diagnostics_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the timing of an operation.
    pub fn record_timing(&self, operation: &str, duration: Duration) {
        let micros = duration.as_micros() as u64;

        self.operation_timings
            .entry(operation.to_string())
            .or_insert_with(Vec::new)
            .push(micros);
    }

    /// Records workspace indexing completion
    pub fn record_workspace_index(&self, package_count: usize) {
        self.workspace_index_count.fetch_add(1, Ordering::Relaxed);
        self.total_packages_indexed.fetch_add(package_count, Ordering::Relaxed);
    }

    /// Gets summary statistics for an operation
    pub fn operation_stats(&self, operation: &str) -> Option<OperationStats> {
        self.operation_timings.get(operation).map(|timings| {
            let mut sorted = timings.value().clone();
            sorted.sort_unstable();

            let count = sorted.len();
            if count == 0 {
                return OperationStats {
                    count: 0,
                    min_micros: 0,
                    max_micros: 0,
                    mean_micros: 0,
                    p50_micros: 0,
                    p95_micros: 0,
                    p99_micros: 0,
                };
            }

            let sum: u64 = sorted.iter().sum();
            let mean = sum / count as u64;

            let p50_idx = count / 2;
            let p95_idx = (count as f64 * 0.95) as usize;
            let p99_idx = (count as f64 * 0.99) as usize;

            OperationStats {
                count,
                min_micros: sorted[0],
                max_micros: sorted[count - 1],
                mean_micros: mean,
                p50_micros: sorted[p50_idx],
                p95_micros: sorted[p95_idx.min(count - 1)],
                p99_micros: sorted[p99_idx.min(count - 1)],
            }
        })
    }

    /// Gets a summary report of all metrics
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            completion_count: self.completion_count.load(Ordering::Relaxed),
            definition_count: self.definition_count.load(Ordering::Relaxed),
            document_symbol_count: self.document_symbol_count.load(Ordering::Relaxed),
            formatting_count: self.formatting_count.load(Ordering::Relaxed),
            parses_completed: self.parses_completed.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            diagnostics_published: self.diagnostics_published.load(Ordering::Relaxed),
            workspace_index_count: self.workspace_index_count.load(Ordering::Relaxed),
            total_packages_indexed: self.total_packages_indexed.load(Ordering::Relaxed),
        }
    }

    /// Resets all metrics (useful for testing)
    pub fn reset(&self) {
        self.completion_count.store(0, Ordering::Relaxed);
        self.definition_count.store(0, Ordering::Relaxed);
        self.document_symbol_count.store(0, Ordering::Relaxed);
        self.formatting_count.store(0, Ordering::Relaxed);
        self.operation_timings.clear();
        self.parses_completed.store(0, Ordering::Relaxed);
        self.parse_errors.store(0, Ordering::Relaxed);
        self.diagnostics_published.store(0, Ordering::Relaxed);
        self.workspace_index_count.store(0, Ordering::Relaxed);
        self.total_packages_indexed.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for a single operation
#[derive(Debug, Clone)]
pub struct OperationStats {
    pub count: usize,
    pub min_micros: u64,
    pub max_micros: u64,
    pub mean_micros: u64,
    pub p50_micros: u64, // Median
    pub p95_micros: u64,
    pub p99_micros: u64,
}

/// Summary of all metrics
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub completion_count: u64,
    pub definition_count: u64,
    pub document_symbol_count: u64,
    pub formatting_count: u64,
    pub parses_completed: u64,
    pub parse_errors: u64,
    pub diagnostics_published: u64,
    pub workspace_index_count: usize,
    pub total_packages_indexed: usize,
}

/// RAII guard for automatic timing measurement
///
/// Records the duration of a scope when dropped.
///
/// # Example
///
/// ```
/// use buildfile_language_server::metrics::{metrics, TimingGuard};
///
/// fn my_operation() {
///     let _guard = TimingGuard::new("my_operation");
///     // ... do work ...
///     // Duration automatically recorded when _guard is dropped
/// }
/// ```
pub struct TimingGuard {
    operation: String,
    start: Instant,
}

impl TimingGuard {
    /// Creates a new timing guard for the given operation
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        metrics().record_timing(&self.operation, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_request_counters() {
        let m = Metrics::new();

        m.record_definition();
        m.record_completion();
        m.record_completion();

        let summary = m.summary();
        assert_eq!(summary.definition_count, 1);
        assert_eq!(summary.completion_count, 2);
    }

    #[test]
    fn test_operation_timing() {
        let m = Metrics::new();

        m.record_timing("test_op", Duration::from_micros(100));
        m.record_timing("test_op", Duration::from_micros(200));
        m.record_timing("test_op", Duration::from_micros(150));

        let stats = m.operation_stats("test_op").unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_micros, 100);
        assert_eq!(stats.max_micros, 200);
        assert_eq!(stats.mean_micros, 150);
        assert_eq!(stats.p50_micros, 150);
    }

    #[test]
    fn test_timing_guard() {
        {
            let _guard = TimingGuard::new("test_guard_unique");
            thread::sleep(Duration::from_millis(10));
        }

        let stats = metrics().operation_stats("test_guard_unique").unwrap();
        assert_eq!(stats.count, 1);
        assert!(stats.min_micros >= 10_000); // At least 10ms
    }

    #[test]
    fn test_reset() {
        let m = Metrics::new();

        m.record_completion();
        m.record_definition();
        m.record_timing("test", Duration::from_micros(100));

        m.reset();

        let summary = m.summary();
        assert_eq!(summary.completion_count, 0);
        assert_eq!(summary.definition_count, 0);
        assert!(m.operation_stats("test").is_none());
    }
}
