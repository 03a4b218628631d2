//! Remote-call metrics.
//!
//! Provides standardized metrics for the completion and generation APIs:
//! - Request counters by operation and status
//! - Latency histograms
//! - Retry counters
//! - Video poll counters by observed task status

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Total remote calls by operation and status.
    pub const REMOTE_CALLS_TOTAL: &str = "nreel_remote_calls_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "nreel_retries_total";

    /// Total video task polls by observed status.
    pub const VIDEO_POLLS_TOTAL: &str = "nreel_video_polls_total";

    /// Remote call latency in seconds by operation.
    pub const REMOTE_LATENCY_SECONDS: &str = "nreel_remote_latency_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record a completed remote call. `status` is the HTTP status code, or
/// `"error"` when no response was received.
pub fn record_remote_call(operation: &'static str, status: &str, latency_secs: f64) {
    counter!(
        names::REMOTE_CALLS_TOTAL,
        "operation" => operation,
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::REMOTE_LATENCY_SECONDS,
        "operation" => operation
    )
    .record(latency_secs);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record one video status poll.
pub fn record_video_poll(status: &'static str) {
    counter!(names::VIDEO_POLLS_TOTAL, "status" => status).increment(1);
}

// =============================================================================
// Tests
// =============================================================================
