//! Metrics and observability utilities
//!
//! Counters and histograms for the scrape/deliver pipeline, exposed through
//! the `metrics` facade. Whatever recorder the binary installs receives them;
//! with none installed they are no-ops.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Noticewatch metrics
pub const METRICS_PREFIX: &str = "noticewatch";

/// Register all metric descriptions
pub fn register_metrics() {
    // Run metrics
    describe_counter!(
        format!("{}_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total pipeline runs"
    );

    describe_histogram!(
        format!("{}_run_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Pipeline run latency in seconds"
    );

    // Source metrics
    describe_counter!(
        format!("{}_notices_scraped_total", METRICS_PREFIX),
        Unit::Count,
        "Same-day notices extracted from boards"
    );

    describe_counter!(
        format!("{}_notices_matched_total", METRICS_PREFIX),
        Unit::Count,
        "Notices whose title matched a keyword"
    );

    describe_counter!(
        format!("{}_source_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Board fetches or parses that failed"
    );

    // Delivery metrics
    describe_counter!(
        format!("{}_notices_delivered_total", METRICS_PREFIX),
        Unit::Count,
        "Notices delivered to the chat"
    );

    describe_counter!(
        format!("{}_delivery_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Notice deliveries that failed"
    );

    // Ledger metrics
    describe_counter!(
        format!("{}_ledger_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Dedup ledger operations that failed"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record run metrics
pub struct RunMetrics {
    start: Instant,
}

impl RunMetrics {
    /// Start tracking a run
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Record run completion
    pub fn finish(self, delivered: usize, failed_sources: usize) {
        let duration = self.start.elapsed().as_secs_f64();
        let outcome = if failed_sources > 0 { "partial" } else { "ok" };

        counter!(
            format!("{}_runs_total", METRICS_PREFIX),
            "outcome" => outcome
        )
        .increment(1);

        histogram!(format!("{}_run_duration_seconds", METRICS_PREFIX)).record(duration);

        tracing::debug!(duration_secs = duration, delivered, failed_sources, "Run metrics recorded");
    }
}

/// Helper to record what a source yielded
pub fn record_source(source: &str, scraped: usize, matched: usize) {
    counter!(
        format!("{}_notices_scraped_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(scraped as u64);

    counter!(
        format!("{}_notices_matched_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(matched as u64);
}

/// Helper to record a failed source
pub fn record_source_failure(source: &str) {
    counter!(
        format!("{}_source_failures_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(1);
}

/// Helper to record delivery metrics
pub fn record_delivery(source: &str, success: bool) {
    let name = if success {
        format!("{}_notices_delivered_total", METRICS_PREFIX)
    } else {
        format!("{}_delivery_failures_total", METRICS_PREFIX)
    };

    counter!(name, "source" => source.to_string()).increment(1);
}

/// Helper to record ledger errors
pub fn record_ledger_error(op: &'static str) {
    counter!(
        format!("{}_ledger_errors_total", METRICS_PREFIX),
        "op" => op
    )
    .increment(1);
}
