// Per-request detection use case: decode → gate size → resolve thresholds →
// infer → normalize. No partial results; any failed step aborts the request.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::core::config::Config;
use crate::core::errors::{DetectionError, ImageCodecError, PipelineResult};
use crate::core::types::{BBox, Detection, DetectionOutcome, RawPrediction, ThresholdParams};
use crate::services::detection::{labels, ObjectDetector};
use crate::utils::image_ops;

pub struct DetectionOrchestrator {
    detector: Arc<dyn ObjectDetector>,
    config: Arc<Config>,
}

impl DetectionOrchestrator {
    pub fn new(detector: Arc<dyn ObjectDetector>, config: Arc<Config>) -> Self {
        Self { detector, config }
    }

    pub fn model_loaded(&self) -> bool {
        self.detector.is_loaded()
    }

    /// Run one detection pass over raw uploaded bytes.
    ///
    /// Precondition: threshold overrides in `params`, when present, have
    /// already been validated to lie in [0, 1] by the HTTP boundary; they are
    /// not re-validated here.
    pub async fn run_detection(
        &self,
        image_bytes: Vec<u8>,
        params: ThresholdParams,
    ) -> PipelineResult<DetectionOutcome> {
        let img = image_ops::load_image_from_memory_async(image_bytes).await?;

        let max_dim = self.config.max_image_dimension();
        if img.width() > max_dim || img.height() > max_dim {
            return Err(ImageCodecError::TooLarge {
                width: img.width(),
                height: img.height(),
                max: max_dim,
            }
            .into());
        }

        let confidence = params
            .confidence_threshold
            .unwrap_or(self.config.confidence_threshold());
        let iou = params.iou_threshold.unwrap_or(self.config.iou_threshold());
        debug!(
            "Running detection: {}x{}, confidence>={:.2}, iou={:.2}",
            img.width(),
            img.height(),
            confidence,
            iou
        );

        // Inference is synchronous and unbounded by contract; run it off the
        // async runtime and bound the caller's wait.
        let timeout_secs = self.config.detection.inference_timeout_secs;
        let detector = Arc::clone(&self.detector);
        let inference = tokio::task::spawn_blocking(move || detector.predict(&img, confidence, iou));

        let raw = tokio::time::timeout(Duration::from_secs(timeout_secs), inference)
            .await
            .map_err(|_| DetectionError::Timeout { secs: timeout_secs })?
            .map_err(|e| DetectionError::TaskJoin(e.to_string()))??;

        Ok(Self::normalize(raw))
    }

    /// Turn the wrapper's parallel sequences into ordered `Detection` records.
    /// Order mirrors the wrapper's output; no re-sorting here.
    fn normalize(raw: RawPrediction) -> DetectionOutcome {
        let detections: Vec<Detection> = raw
            .class_ids
            .iter()
            .zip(raw.confidences.iter())
            .zip(raw.boxes.iter())
            .map(|((&class_id, &confidence), bbox)| Detection {
                class_id,
                class_name: labels::class_name(class_id).to_string(),
                confidence,
                bbox: BBox {
                    x1: bbox[0],
                    y1: bbox[1],
                    x2: bbox[2],
                    y2: bbox[3],
                },
            })
            .collect();

        let count = detections.len();
        DetectionOutcome {
            detections,
            count,
            annotated: raw.annotated,
        }
    }
}
