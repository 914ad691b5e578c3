use super::DetectionEngine;
use crate::preprocess::letterbox;
use crate::{Detection, EngineError, postprocess};
use image::RgbImage;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::sync::Mutex;

/// ONNX Runtime backend for YOLO-family detection models exported with
/// an `images` input and a `[1, 4 + nc, anchors]` `output0`.
///
/// An ORT session is not documented reentrant, so the session sits
/// behind a mutex and `max_concurrency` stays at 1; the dispatch layer
/// never issues overlapping calls.
pub struct OrtEngine {
    session: Mutex<Session>,
    input_size: (u32, u32),
}

impl OrtEngine {
    pub fn load(path: &str, input_size: (u32, u32)) -> Result<Self, EngineError> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(4))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| EngineError::ModelLoad(e.to_string()))?;

        tracing::info!(model_path = path, "Model loaded");

        Ok(Self {
            session: Mutex::new(session),
            input_size,
        })
    }
}

impl DetectionEngine for OrtEngine {
    fn infer(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, EngineError> {
        let (orig_width, orig_height) = image.dimensions();
        let (tensor, transform) = letterbox(image, self.input_size.0, self.input_size.1)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EngineError::Inference("session mutex poisoned".to_string()))?;

        let outputs = session
            .run(
                ort::inputs![
                    "images" => TensorRef::from_array_view(tensor.view())
                        .map_err(|e| EngineError::Inference(e.to_string()))?
                ],
            )
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        let raw = outputs["output0"]
            .try_extract_array::<f32>()
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        Ok(postprocess::parse_detections(
            &raw.view(),
            &transform,
            orig_width,
            orig_height,
            confidence_threshold,
        ))
    }

    fn max_concurrency(&self) -> usize {
        1
    }
}
