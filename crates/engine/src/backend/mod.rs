use crate::{Detection, EngineError};
use image::RgbImage;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// A loaded object-detection model.
///
/// The gateway shares one instance of this across every connection, so
/// implementations must be `Send + Sync`. Implementations that are not
/// safe for overlapping `infer` calls keep the default
/// `max_concurrency` of 1; the dispatch layer never exceeds it.
pub trait DetectionEngine: Send + Sync + 'static {
    /// Run detection on one decoded image. Returns zero or more
    /// detections in the engine's own output order.
    fn infer(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, EngineError>;

    /// Number of `infer` calls this engine is documented safe to run
    /// concurrently. Defaults to 1 (serialize everything) since most
    /// loaded models are not reentrant.
    fn max_concurrency(&self) -> usize {
        1
    }
}
