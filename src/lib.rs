// Library exports for the object detection API

pub mod api;
pub mod core;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{ConfigError, DetectionError, ImageCodecError, PipelineError},
    types::{
        AppState, BBox, Detection, DetectionOutcome, DetectionResponse, HealthResponse,
        RawPrediction, ThresholdParams,
    },
};

pub use crate::orchestration::DetectionOrchestrator;
pub use crate::services::detection::{ObjectDetector, YoloDetector};
pub use crate::utils::{encode_jpeg_async, load_image_from_memory_async};
