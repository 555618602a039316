//! Prometheus metrics for the API and the background worker.
//!
//! This module provides metrics for:
//! - HTTP request latency
//! - Run creation and asset upserts
//! - Job claims, completions, retries and failures
//! - Job processing latency

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// === Metric Name Constants ===

/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";
/// Job processing latency metric name.
pub const METRIC_JOB_LATENCY: &str = "job_latency_ms";
/// Runs created counter metric name.
pub const METRIC_RUNS_CREATED: &str = "runs_created_total";
/// Assets upserted counter metric name.
pub const METRIC_ASSETS_UPSERTED: &str = "assets_upserted_total";
/// Jobs claimed counter metric name.
pub const METRIC_JOBS_CLAIMED: &str = "jobs_claimed_total";
/// Jobs completed counter metric name.
pub const METRIC_JOBS_COMPLETED: &str = "jobs_completed_total";
/// Jobs re-queued after a failed attempt.
pub const METRIC_JOBS_RETRIED: &str = "jobs_retried_total";
/// Jobs that exhausted their attempts.
pub const METRIC_JOBS_FAILED: &str = "jobs_failed_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );
    describe_histogram!(METRIC_JOB_LATENCY, "Job processing latency in milliseconds");

    describe_counter!(METRIC_RUNS_CREATED, "Total number of runs created");
    describe_counter!(METRIC_ASSETS_UPSERTED, "Total number of assets upserted");
    describe_counter!(METRIC_JOBS_CLAIMED, "Total number of jobs claimed by workers");
    describe_counter!(METRIC_JOBS_COMPLETED, "Total number of jobs completed");
    describe_counter!(METRIC_JOBS_RETRIED, "Total number of job attempts re-queued");
    describe_counter!(METRIC_JOBS_FAILED, "Total number of jobs failed permanently");

    debug!("Metrics initialized");
}

/// Install the global Prometheus recorder and return its render handle.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// Record HTTP request latency.
pub fn record_http_latency(start: Instant, endpoint: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "endpoint" => endpoint.to_string()).record(latency_ms);
}

/// Increment runs created counter.
pub fn inc_runs_created() {
    counter!(METRIC_RUNS_CREATED).increment(1);
}

/// Add to the assets upserted counter.
pub fn inc_assets_upserted(count: u64) {
    counter!(METRIC_ASSETS_UPSERTED).increment(count);
}

/// Increment jobs claimed counter.
pub fn inc_jobs_claimed() {
    counter!(METRIC_JOBS_CLAIMED).increment(1);
}

/// Increment jobs completed counter.
pub fn inc_jobs_completed() {
    counter!(METRIC_JOBS_COMPLETED).increment(1);
}

/// Increment jobs retried counter.
pub fn inc_jobs_retried() {
    counter!(METRIC_JOBS_RETRIED).increment(1);
}

/// Increment jobs failed counter.
pub fn inc_jobs_failed() {
    counter!(METRIC_JOBS_FAILED).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for job processing.
pub fn timer_job() -> LatencyTimer {
    LatencyTimer::new(METRIC_JOB_LATENCY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = LatencyTimer::new("test_metric");
        sleep(Duration::from_millis(10));
        let elapsed = timer.elapsed_ms();
        assert!(elapsed >= 9.0);
    }

    #[test]
    fn counters_reach_the_prometheus_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            inc_runs_created();
            inc_assets_upserted(3);
            inc_jobs_failed();
            inc_jobs_failed();
        });

        let rendered = handle.render();
        assert!(rendered.contains("runs_created_total 1"), "{rendered}");
        assert!(rendered.contains("assets_upserted_total 3"), "{rendered}");
        assert!(rendered.contains("jobs_failed_total 2"), "{rendered}");
        assert!(!rendered.contains("jobs_completed_total"), "{rendered}");
    }
}
