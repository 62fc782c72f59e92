//! Shared data models for the ODet detection service.
//!
//! This crate provides Serde-serializable types for:
//! - Detections and bounding boxes
//! - Model information
//! - Detection modes and their default thresholds
//! - HTTP request/response envelopes

pub mod api;
pub mod detection;
pub mod detection_mode;
pub mod model_info;

// Re-export common types
pub use api::{ApiEnvelope, DetectRequest, DetectionData, ErrorBody, HealthData, HealthStatus};
pub use detection::{BoundingBox, Detection};
pub use detection_mode::{DetectionMode, Thresholds};
pub use model_info::ModelInfo;
