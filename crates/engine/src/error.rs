use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("unsupported image shape: {0}")]
    UnsupportedImage(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_failure() {
        let err = EngineError::ModelLoad("best.onnx not found".to_string());
        assert_eq!(err.to_string(), "failed to load model: best.onnx not found");

        let err = EngineError::UnsupportedImage("0x0 input".to_string());
        assert_eq!(err.to_string(), "unsupported image shape: 0x0 input");

        let err = EngineError::Inference("session run failed".to_string());
        assert_eq!(err.to_string(), "inference failed: session run failed");
    }
}
