use crate::Detection;
use crate::preprocess::LetterboxTransform;
use ndarray::ArrayViewD;

const IOU_THRESHOLD: f32 = 0.45;

/// Decode a raw YOLO-style output tensor of shape `[1, 4 + num_classes,
/// num_anchors]` (cx/cy/w/h rows followed by per-class scores) into
/// detections in original-image pixel space, then suppress overlapping
/// boxes per class.
pub fn parse_detections(
    output: &ArrayViewD<f32>,
    transform: &LetterboxTransform,
    orig_width: u32,
    orig_height: u32,
    confidence_threshold: f32,
) -> Vec<Detection> {
    let shape = output.shape();
    if shape.len() != 3 || shape[1] < 5 {
        return Vec::new();
    }
    let num_classes = shape[1] - 4;
    let num_anchors = shape[2];

    let mut detections = Vec::new();

    for i in 0..num_anchors {
        let mut best_score = 0.0f32;
        let mut best_class = 0usize;
        for c in 0..num_classes {
            let score = output[[0, 4 + c, i]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score < confidence_threshold {
            continue;
        }

        let cx = output[[0, 0, i]];
        let cy = output[[0, 1, i]];
        let w = output[[0, 2, i]];
        let h = output[[0, 3, i]];

        let x1 = ((cx - w / 2.0 - transform.pad_x) / transform.scale)
            .clamp(0.0, orig_width as f32);
        let y1 = ((cy - h / 2.0 - transform.pad_y) / transform.scale)
            .clamp(0.0, orig_height as f32);
        let x2 = ((cx + w / 2.0 - transform.pad_x) / transform.scale)
            .clamp(0.0, orig_width as f32);
        let y2 = ((cy + h / 2.0 - transform.pad_y) / transform.scale)
            .clamp(0.0, orig_height as f32);

        detections.push(Detection {
            x1,
            y1,
            x2,
            y2,
            confidence: best_score,
            class_id: best_class as u32,
        });
    }

    nms(detections, IOU_THRESHOLD)
}

/// Class-aware non-maximum suppression, highest confidence first.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();

    for candidate in detections {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.iou(&candidate) >= iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}
