// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Source error chaining

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {key} has malformed value '{value}'")]
    Malformed { key: &'static str, value: String },

    #[error("Confidence threshold must be in [0.0, 1.0], got {0}")]
    InvalidConfidenceThreshold(f32),

    #[error("IoU threshold must be in [0.0, 1.0], got {0}")]
    InvalidIoUThreshold(f32),

    #[error("Max image dimension must be > 0")]
    InvalidMaxImageDimension,

    #[error("Model input size must be > 0")]
    InvalidInputSize,
}

/// Image codec boundary errors
#[derive(Debug, Error)]
pub enum ImageCodecError {
    #[error("Could not decode image from bytes")]
    Decode(#[source] image::ImageError),

    #[error("Could not encode annotated image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Image dimensions {width}x{height} exceed maximum of {max} pixels per side")]
    TooLarge { width: u32, height: u32, max: u32 },
}

/// Model wrapper errors
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("ONNX inference failed: {0}")]
    Inference(#[from] ort::Error),

    #[error("Unexpected model output: {0}")]
    Postprocess(String),

    #[error("Inference timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Inference task failed: {0}")]
    TaskJoin(String),
}

/// Per-request orchestration errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Codec(#[from] ImageCodecError),

    #[error(transparent)]
    Detection(#[from] DetectionError),
}

impl PipelineError {
    /// True when the failure was caused by the client's input rather than the
    /// model or the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::Codec(_))
    }
}

// Convenience type aliases for Results
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type CodecResult<T> = Result<T, ImageCodecError>;
pub type DetectionResult<T> = Result<T, DetectionError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
