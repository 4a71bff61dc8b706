// Data model shared between the model wrapper, the orchestrator and the API

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::config::Config;
use crate::orchestration::DetectionOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<DetectionOrchestrator>,
}

/// Bounding box in pixel coordinates of the original image.
///
/// Invariant (guaranteed by the model wrapper, not re-validated): x1 <= x2
/// and y1 <= y2, within image bounds.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// A single detected object
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub class_id: u32,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BBox,
}

/// Fixed structural contract for the raw model output: parallel sequences of
/// class ids, confidences and box coordinates, plus the annotated frame the
/// wrapper always renders alongside them.
#[derive(Debug, Clone)]
pub struct RawPrediction {
    pub class_ids: Vec<u32>,
    pub confidences: Vec<f32>,
    pub boxes: Vec<[f32; 4]>,
    pub annotated: RgbImage,
}

/// Result of one detection run, owned by the orchestrator for the lifetime of
/// a single request. `detections` mirrors the order of the wrapper's output.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub detections: Vec<Detection>,
    pub count: usize,
    pub annotated: RgbImage,
}

/// Optional per-request threshold overrides, parsed from the query string.
/// Range validation happens at the HTTP boundary before the orchestrator runs.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ThresholdParams {
    pub confidence_threshold: Option<f32>,
    pub iou_threshold: Option<f32>,
}

/// JSON body of a successful `/detection/detect` response
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResponse {
    pub detections: Vec<Detection>,
    pub count: usize,
    pub message: String,
}

impl DetectionResponse {
    pub fn new(detections: Vec<Detection>, count: usize) -> Self {
        Self {
            detections,
            count,
            message: "Detection completed successfully".to_string(),
        }
    }
}

/// JSON body of `/detection/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub model_path: String,
}
