//! Observability infrastructure for the resource exporter
//!
//! Provides:
//! - Prometheus self-metrics (cycle latency, cycle outcomes, query errors, pods tracked)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cycle latency (in seconds)
const CYCLE_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ExporterMetricsInner> = OnceLock::new();

struct ExporterMetricsInner {
    cycle_latency_seconds: Histogram,
    cycles_completed: IntCounter,
    cycles_failed: IntCounter,
    triggers_skipped: IntCounter,
    query_errors: IntCounterVec,
    pods_tracked: IntGauge,
    gauges_published: IntGauge,
}

impl ExporterMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "resource_exporter_cycle_latency_seconds",
                "Time spent running one evaluation cycle",
                CYCLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            cycles_completed: register_int_counter!(
                "resource_exporter_cycles_completed_total",
                "Total number of evaluation cycles that published gauges"
            )
            .expect("Failed to register cycles_completed"),

            cycles_failed: register_int_counter!(
                "resource_exporter_cycles_failed_total",
                "Total number of evaluation cycles aborted by a query failure"
            )
            .expect("Failed to register cycles_failed"),

            triggers_skipped: register_int_counter!(
                "resource_exporter_triggers_skipped_total",
                "Total number of poll triggers skipped because a cycle was still running"
            )
            .expect("Failed to register triggers_skipped"),

            query_errors: register_int_counter_vec!(
                "resource_exporter_query_errors_total",
                "Total number of failed backend queries by error kind",
                &["kind"]
            )
            .expect("Failed to register query_errors"),

            pods_tracked: register_int_gauge!(
                "resource_exporter_pods_tracked",
                "Number of pods seen in the last completed cycle"
            )
            .expect("Failed to register pods_tracked"),

            gauges_published: register_int_gauge!(
                "resource_exporter_gauges_published",
                "Number of gauge values published in the last completed cycle"
            )
            .expect("Failed to register gauges_published"),
        }
    }
}

/// Exporter metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ExporterMetrics {
    _private: (),
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ExporterMetricsInner {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new)
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }

    /// Record a cycle that published gauges
    pub fn record_cycle_completed(&self, pods: usize, gauges: usize) {
        let inner = self.inner();
        inner.cycles_completed.inc();
        inner.pods_tracked.set(pods as i64);
        inner.gauges_published.set(gauges as i64);
    }

    pub fn inc_cycles_failed(&self) {
        self.inner().cycles_failed.inc();
    }

    pub fn add_triggers_skipped(&self, count: u64) {
        self.inner().triggers_skipped.inc_by(count);
    }

    pub fn inc_query_errors(&self, kind: &str) {
        self.inner().query_errors.with_label_values(&[kind]).inc();
    }

    pub fn cycles_completed(&self) -> u64 {
        self.inner().cycles_completed.get()
    }

    pub fn cycles_failed(&self) -> u64 {
        self.inner().cycles_failed.get()
    }
}

/// Structured logger for exporter events
///
/// Provides consistent JSON-formatted logging for cycle outcomes and
/// lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    backend: String,
}

impl StructuredLogger {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
        }
    }

    pub fn log_startup(&self, version: &str, port: u16, poll_interval_secs: u64) {
        info!(
            event = "exporter_started",
            backend = %self.backend,
            exporter_version = %version,
            port = port,
            poll_interval_secs = poll_interval_secs,
            "Resource exporter started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            backend = %self.backend,
            reason = %reason,
            "Resource exporter shutting down"
        );
    }

    pub fn log_cycle_complete(&self, pods: usize, gauges: usize, elapsed_ms: u128) {
        info!(
            event = "cycle_complete",
            backend = %self.backend,
            pods = pods,
            gauges = gauges,
            elapsed_ms = elapsed_ms,
            "Evaluation cycle published"
        );
    }

    pub fn log_cycle_failed(&self, error: &anyhow::Error, elapsed_ms: u128) {
        warn!(
            event = "cycle_failed",
            backend = %self.backend,
            error = %format!("{:#}", error),
            elapsed_ms = elapsed_ms,
            "Evaluation cycle aborted, nothing published"
        );
    }

    pub fn log_triggers_skipped(&self, skipped: u64, elapsed_ms: u128) {
        warn!(
            event = "triggers_skipped",
            backend = %self.backend,
            skipped = skipped,
            elapsed_ms = elapsed_ms,
            "Cycle outlasted the poll interval, skipping overlapping triggers"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_metrics_creation() {
        let metrics = ExporterMetrics::new();

        metrics.observe_cycle_latency(0.05);
        metrics.add_triggers_skipped(2);
        metrics.inc_query_errors("timeout");

        let before = metrics.cycles_completed();
        metrics.record_cycle_completed(3, 27);
        assert!(metrics.cycles_completed() > before);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("http://prometheus:9090");
        assert_eq!(logger.backend, "http://prometheus:9090");
    }
}
