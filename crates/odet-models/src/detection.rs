//! Detection records returned to clients.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in original-image pixel coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Build a box from two corners.
    ///
    /// Corners are ordered first, so the resulting width and height are
    /// never negative even when the input corners are swapped.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let (left, right) = if x2 < x1 { (x2, x1) } else { (x1, x2) };
        let (top, bottom) = if y2 < y1 { (y2, y1) } else { (y1, y2) };
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }
}

/// One recognized object instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Human-readable class label
    pub label: String,
    /// Detection confidence [0, 1]
    pub confidence: f32,
    /// Bounding box in original-image pixels
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Index into the model's class list
    pub class_id: usize,
}

impl Detection {
    /// Label used when a class index has no entry in the model's class list.
    pub fn fallback_label(class_id: usize) -> String {
        format!("class_{}", class_id)
    }
}
