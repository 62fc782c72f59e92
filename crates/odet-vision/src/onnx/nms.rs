//! Per-class non-maximum suppression.

use crate::capability::RawBox;

/// Drop boxes overlapping a higher-scoring box of the same class by more
/// than `iou_threshold`. Output is sorted by descending confidence.
pub fn non_maximum_suppression(mut boxes: Vec<RawBox>, iou_threshold: f32) -> Vec<RawBox> {
    if boxes.is_empty() {
        return boxes;
    }

    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(boxes[i]);

        for j in (i + 1)..boxes.len() {
            if suppressed[j] || boxes[i].class_id != boxes[j].class_id {
                continue;
            }

            if boxes[i].iou(&boxes[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}
