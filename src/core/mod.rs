pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{ConfigError, DetectionError, ImageCodecError, PipelineError};
pub use types::{
    AppState, BBox, Detection, DetectionOutcome, DetectionResponse, HealthResponse, RawPrediction,
    ThresholdParams,
};
