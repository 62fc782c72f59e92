//! Detection modes and their default thresholds.
//!
//! - `Full`: full-resolution inference, stricter thresholds
//! - `Stream`: bounded-width inference for live video frames, looser thresholds

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence and IoU thresholds for one inference call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Thresholds {
    /// Minimum score for a box to be kept
    pub confidence: f32,
    /// Overlap above which duplicate boxes are suppressed
    pub iou: f32,
}

impl Thresholds {
    pub const fn new(confidence: f32, iou: f32) -> Self {
        Self { confidence, iou }
    }

    /// Override defaults with any values supplied by the caller.
    pub fn with_overrides(self, confidence: Option<f32>, iou: Option<f32>) -> Self {
        Self {
            confidence: confidence.unwrap_or(self.confidence),
            iou: iou.unwrap_or(self.iou),
        }
    }

    /// Both values inside [0, 1].
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence) && (0.0..=1.0).contains(&self.iou)
    }
}

/// Latency/accuracy profile of a detection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Inference on the raster as decoded.
    #[default]
    Full,

    /// Inference on a width-bounded copy; boxes mapped back to the original.
    Stream,
}

impl DetectionMode {
    /// Returns the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMode::Full => "full",
            DetectionMode::Stream => "stream",
        }
    }

    /// Thresholds applied when the request does not specify them.
    pub fn default_thresholds(&self) -> Thresholds {
        match self {
            DetectionMode::Full => Thresholds::new(0.5, 0.4),
            DetectionMode::Stream => Thresholds::new(0.3, 0.5),
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
