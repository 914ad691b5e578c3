pub mod backend;
pub mod detection;
pub mod error;
pub mod postprocess;
pub mod preprocess;

// Re-export commonly used types for convenience
pub use backend::DetectionEngine;
pub use detection::Detection;
pub use error::EngineError;
