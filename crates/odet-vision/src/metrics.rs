//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! these calls are no-ops.

use metrics::{counter, histogram};
use odet_models::DetectionMode;

/// Metric names as constants for consistency.
pub mod names {
    pub const INFERENCE_DURATION_SECONDS: &str = "odet_inference_duration_seconds";
    pub const DETECTIONS_TOTAL: &str = "odet_detections_total";
    pub const INFERENCE_FAILURES_TOTAL: &str = "odet_inference_failures_total";
}

/// Record a completed inference.
pub fn record_inference(mode: DetectionMode, duration_secs: f64, detections: usize) {
    let labels = [("mode", mode.as_str().to_string())];
    histogram!(names::INFERENCE_DURATION_SECONDS, &labels).record(duration_secs);
    counter!(names::DETECTIONS_TOTAL, &labels).increment(detections as u64);
}

/// Record a failed inference.
pub fn record_inference_failure(mode: DetectionMode) {
    let labels = [("mode", mode.as_str().to_string())];
    counter!(names::INFERENCE_FAILURES_TOTAL, &labels).increment(1);
}
