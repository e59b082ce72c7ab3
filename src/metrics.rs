//! Prometheus metrics for the ingestion and detection pipeline.
//!
//! Counters track tick flow through stream -> relay -> broker -> cache and
//! the detector's outcomes; histograms track publish and pass latency.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// Stream messages received counter metric name.
pub const METRIC_TICKS_RECEIVED: &str = "stream_ticks_received_total";
/// Stream parse errors counter metric name.
pub const METRIC_PARSE_ERRORS: &str = "stream_parse_errors_total";
/// Stream connections opened counter metric name.
pub const METRIC_STREAM_CONNECTIONS: &str = "stream_connections_total";
/// Ticks published to the broker counter metric name.
pub const METRIC_TICKS_PUBLISHED: &str = "relay_ticks_published_total";
/// Broker publish latency metric name.
pub const METRIC_PUBLISH_LATENCY: &str = "relay_publish_latency_ms";
/// Cache writes counter metric name.
pub const METRIC_CACHE_WRITES: &str = "cache_writes_total";
/// Failed cache writes counter metric name.
pub const METRIC_CACHE_WRITE_FAILURES: &str = "cache_write_failures_total";
/// Unresolvable inverse symbols counter metric name.
pub const METRIC_INVERSE_UNRESOLVED: &str = "cache_inverse_unresolved_total";
/// Paths skipped for missing data counter metric name.
pub const METRIC_PATHS_SKIPPED: &str = "detector_paths_skipped_total";
/// Opportunities detected counter metric name.
pub const METRIC_OPPORTUNITIES_DETECTED: &str = "opportunities_detected_total";
/// Detector pass latency metric name.
pub const METRIC_PASS_LATENCY: &str = "detector_pass_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_PUBLISH_LATENCY,
        "Broker publish latency in milliseconds"
    );
    describe_histogram!(
        METRIC_PASS_LATENCY,
        "Time to scan every triangular path once in milliseconds"
    );

    describe_counter!(
        METRIC_TICKS_RECEIVED,
        "Total number of bookTicker messages turned into ticks"
    );
    describe_counter!(
        METRIC_PARSE_ERRORS,
        "Total number of stream or relay messages dropped as unparseable"
    );
    describe_counter!(
        METRIC_STREAM_CONNECTIONS,
        "Total number of streaming connections opened"
    );
    describe_counter!(
        METRIC_TICKS_PUBLISHED,
        "Total number of ticks handed to the broker"
    );
    describe_counter!(
        METRIC_CACHE_WRITES,
        "Total number of price cache entries written"
    );
    describe_counter!(
        METRIC_CACHE_WRITE_FAILURES,
        "Total number of price cache writes that failed"
    );
    describe_counter!(
        METRIC_INVERSE_UNRESOLVED,
        "Total number of ticks whose inverse symbol could not be resolved"
    );
    describe_counter!(
        METRIC_PATHS_SKIPPED,
        "Total number of path evaluations skipped for missing prices"
    );
    describe_counter!(
        METRIC_OPPORTUNITIES_DETECTED,
        "Total number of triangular arbitrage opportunities detected"
    );

    debug!("Metrics initialized");
}

/// Record broker publish latency.
pub fn record_publish_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_PUBLISH_LATENCY).record(latency_ms);
}

/// Increment ticks received counter.
pub fn inc_ticks_received() {
    counter!(METRIC_TICKS_RECEIVED).increment(1);
}

/// Increment parse errors counter for a pipeline stage ("stream" or "relay").
pub fn inc_parse_errors(stage: &'static str) {
    counter!(METRIC_PARSE_ERRORS, "stage" => stage).increment(1);
}

/// Increment stream connections counter.
pub fn inc_stream_connections() {
    counter!(METRIC_STREAM_CONNECTIONS).increment(1);
}

/// Increment ticks published counter.
pub fn inc_ticks_published() {
    counter!(METRIC_TICKS_PUBLISHED).increment(1);
}

/// Increment cache writes counter ("direct" or "inverse").
pub fn inc_cache_writes(kind: &'static str) {
    counter!(METRIC_CACHE_WRITES, "kind" => kind).increment(1);
}

/// Increment failed cache writes counter.
pub fn inc_cache_write_failures(kind: &'static str) {
    counter!(METRIC_CACHE_WRITE_FAILURES, "kind" => kind).increment(1);
}

/// Increment unresolved inverse counter.
pub fn inc_inverse_unresolved() {
    counter!(METRIC_INVERSE_UNRESOLVED).increment(1);
}

/// Add skipped paths for one pass.
pub fn add_paths_skipped(count: u64) {
    counter!(METRIC_PATHS_SKIPPED).increment(count);
}

/// Increment opportunities detected counter for one side.
pub fn inc_opportunities_detected(side: &'static str) {
    counter!(METRIC_OPPORTUNITIES_DETECTED, "side" => side).increment(1);
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
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for one detector pass.
pub fn timer_detector_pass() -> LatencyTimer {
    LatencyTimer::new(METRIC_PASS_LATENCY)
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
    fn counters_without_recorder_are_noops() {
        inc_ticks_received();
        inc_parse_errors("stream");
        add_paths_skipped(3);
        inc_opportunities_detected("ask");
    }
}
