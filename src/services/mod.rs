pub mod detection;

// Re-export commonly used services
pub use detection::{ObjectDetector, YoloDetector};
