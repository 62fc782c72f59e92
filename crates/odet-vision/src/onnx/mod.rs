//! ONNX Runtime detector capability.
//!
//! | Piece | Role |
//! |-------|------|
//! | `yolo` | Session setup, preprocessing, YOLOv8 output decoding |
//! | `nms` | Per-class non-maximum suppression |
//! | `labels` | COCO defaults and label files |

pub mod labels;
pub mod nms;
pub mod yolo;

pub use labels::{coco_class_names, load_class_names, COCO_CLASSES};
pub use nms::non_maximum_suppression;
pub use yolo::{decode_output, OnnxYoloConfig, OnnxYoloDetector};

/// Execution device a session would be built for on this target.
///
/// Reported by the model info endpoint when no session exists.
pub fn preferred_device() -> &'static str {
    if cfg!(all(target_os = "linux", feature = "cuda")) {
        "cuda"
    } else if cfg!(target_os = "macos") {
        "coreml"
    } else {
        "cpu"
    }
}
