//! Class label tables.

use std::path::Path;

use crate::error::{VisionError, VisionResult};

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// COCO labels as owned strings.
pub fn coco_class_names() -> Vec<String> {
    COCO_CLASSES.iter().map(|s| s.to_string()).collect()
}

/// Read labels from a text file, one per line; the line index is the class id.
///
/// Surrounding whitespace is trimmed and trailing blank lines are ignored.
/// A blank line before the last label would shift every later id, so the
/// file is rejected instead.
pub fn load_class_names(path: impl AsRef<Path>) -> VisionResult<Vec<String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;

    let mut names: Vec<String> = contents
        .lines()
        .map(|line| line.trim().to_string())
        .collect();
    while names.last().is_some_and(|name| name.is_empty()) {
        names.pop();
    }

    if let Some(index) = names.iter().position(String::is_empty) {
        return Err(VisionError::invalid_argument(format!(
            "class names file {} has a blank line at line {}",
            path.display(),
            index + 1
        )));
    }

    if names.is_empty() {
        return Err(VisionError::invalid_argument(format!(
            "class names file {} is empty",
            path.display()
        )));
    }

    Ok(names)
}
