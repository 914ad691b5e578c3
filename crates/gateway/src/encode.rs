use engine::Detection;
use serde::{Deserialize, Serialize};

/// Canonical wire shape for one detection: flat keys, integer pixel
/// coordinates, confidence rounded to four decimals. Field order is the
/// serialized order, so identical inputs always produce byte-identical
/// payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDetection {
    pub cls: u32,
    pub conf: f32,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl From<&Detection> for WireDetection {
    fn from(det: &Detection) -> Self {
        Self {
            cls: det.class_id,
            conf: round_confidence(det.confidence),
            x1: det.x1.round() as i32,
            y1: det.y1.round() as i32,
            x2: det.x2.round() as i32,
            y2: det.y2.round() as i32,
        }
    }
}

/// HTTP response body for the one-shot detect endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    pub detections: Vec<WireDetection>,
}

pub fn encode_detections(detections: &[Detection]) -> Vec<WireDetection> {
    detections.iter().map(WireDetection::from).collect()
}

/// Serialize one frame's detections for the streaming path: a bare JSON
/// array, `[]` when nothing was detected.
pub fn ws_payload(detections: &[Detection]) -> serde_json::Result<String> {
    serde_json::to_string(&encode_detections(detections))
}

/// Best-effort error notification payload, shared by both transports.
pub fn error_payload(kind: &str, message: &str) -> String {
    serde_json::json!({ "error": { "kind": kind, "message": message } }).to_string()
}

fn round_confidence(conf: f32) -> f32 {
    (conf * 10_000.0).round() / 10_000.0
}
