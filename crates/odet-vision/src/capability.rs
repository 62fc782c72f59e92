//! The detector capability seam.
//!
//! A capability is an opaque model: given a raster and two thresholds it
//! returns boxes in that raster's pixel space. The engine owns one behind an
//! `Arc` so production code can plug in ONNX Runtime and tests a stub.

use crate::error::VisionResult;
use crate::raster::Raster;

/// One box as produced by a capability, in the coordinate space of the
/// raster that was passed to [`DetectorCapability::infer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl RawBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: usize) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over Union with another box.
    pub fn iou(&self, other: &RawBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Pretrained detector invoked once per request.
///
/// Implementations must be safe to call from several threads; those that
/// wrap a non-reentrant runtime serialize access internally.
#[cfg_attr(test, mockall::automock)]
pub trait DetectorCapability: Send + Sync {
    /// Run the model on `raster`, keeping boxes scoring at least
    /// `confidence_threshold` and suppressing overlaps above `iou_threshold`.
    fn infer(
        &self,
        raster: &Raster,
        confidence_threshold: f32,
        iou_threshold: f32,
    ) -> VisionResult<Vec<RawBox>>;

    /// Capability name for logging.
    fn name(&self) -> &'static str;
}
