pub mod annotate;
pub mod labels;

use crate::core::errors::{DetectionError, DetectionResult};
use crate::core::types::{BBox, Detection, RawPrediction};
use image::DynamicImage;
use ndarray::{s, Array4, ArrayViewD, Axis, IxDyn};
use ort::execution_providers::CPUExecutionProvider;

#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Seam between the orchestrator and the inference backend, so tests can run
/// the full request path against a stub model.
pub trait ObjectDetector: Send + Sync {
    /// Run one inference pass. Synchronous and CPU/accelerator-bound; callers
    /// are expected to move it off the async runtime.
    fn predict(
        &self,
        img: &DynamicImage,
        confidence_threshold: f32,
        iou_threshold: f32,
    ) -> DetectionResult<RawPrediction>;

    fn is_loaded(&self) -> bool;
}

/// Post-decode candidate, before and after NMS.
#[derive(Debug, Clone)]
struct Candidate {
    class_id: u32,
    confidence: f32,
    bbox: [f32; 4],
}

/// Wrapper around a single loaded YOLO ONNX session.
///
/// Construction is the load: a `YoloDetector` that exists has a usable model,
/// so a "predict before load" state is unrepresentable. `ort` sessions take
/// `&mut self` to run and are not verified safe for concurrent inference, so
/// calls are serialized through the session mutex.
#[derive(Debug)]
pub struct YoloDetector {
    session: Mutex<Session>,
    input_size: u32,
    device_type: String,
    model_path: PathBuf,
}

impl YoloDetector {
    /// Load the model artifact from disk. Fails when the path does not exist
    /// or the bytes are not a parseable ONNX graph.
    pub fn load(path: &Path, input_size: u32) -> DetectionResult<Self> {
        if !path.exists() {
            return Err(DetectionError::ModelLoad {
                path: path.to_path_buf(),
                reason: "model file not found".to_string(),
            });
        }

        let model_bytes = std::fs::read(path).map_err(|e| DetectionError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Loading ONNX model from {} ({} bytes)...", path.display(), model_bytes.len());

        let (device_type, session) =
            Self::build_session(&model_bytes).map_err(|e| DetectionError::ModelLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        info!("✓ Detection model ready on {}", device_type);

        Ok(Self {
            session: Mutex::new(session),
            input_size,
            device_type,
            model_path: path.to_path_buf(),
        })
    }

    fn build_session(model_bytes: &[u8]) -> Result<(String, Session), ort::Error> {
        // Try CUDA first when compiled in, then fall back to plain CPU
        #[cfg(feature = "cuda")]
        {
            if let Ok(session) = Session::builder()
                .and_then(|b| b.with_execution_providers([CUDAExecutionProvider::default().build()]))
                .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                .and_then(|b| b.with_intra_threads(num_cpus::get()))
                .and_then(|b| b.commit_from_memory(model_bytes))
            {
                info!("✓ Using CUDA acceleration");
                return Ok(("CUDA".to_string(), session));
            }
        }

        let session = Session::builder()?
            .with_execution_providers([CPUExecutionProvider::default().build()])?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_cpus::get())?
            .commit_from_memory(model_bytes)?;

        Ok(("CPU".to_string(), session))
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Resize to the model's square input and normalize to [0,1] CHW.
    fn preprocess_image(&self, img: &DynamicImage) -> Array4<f32> {
        let target = self.input_size as usize;
        trace!(
            "Preprocessing image: {}x{} → {}x{}",
            img.width(),
            img.height(),
            target,
            target
        );

        let resized = img.resize_exact(
            self.input_size,
            self.input_size,
            image::imageops::FilterType::Triangle,
        );
        let rgb_img = resized.to_rgb8();

        let mut array = Array4::<f32>::zeros((1, 3, target, target));
        for (x, y, pixel) in rgb_img.enumerate_pixels() {
            array[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            array[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            array[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }

        array
    }

    /// Decode the YOLO output head: one column per candidate, rows 0..4 are
    /// the xywh box in input-space, rows 4.. are per-class scores. Scores are
    /// filtered against the confidence threshold and boxes scaled back to the
    /// original resolution as xyxy.
    fn decode_output(
        &self,
        view: &ArrayViewD<'_, f32>,
        orig_width: u32,
        orig_height: u32,
        confidence_threshold: f32,
    ) -> DetectionResult<Vec<Candidate>> {
        let dims = view.shape();
        if dims.len() != 2 || dims[0] <= 4 {
            return Err(DetectionError::Postprocess(format!(
                "expected [4+classes, candidates] output, got {:?}",
                dims
            )));
        }

        let num_candidates = dims[1];
        let sx = orig_width as f32 / self.input_size as f32;
        let sy = orig_height as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for i in 0..num_candidates {
            let scores = view.slice(s![4.., i]);
            let Some((class_id, &max_score)) = scores
                .indexed_iter()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            else {
                continue;
            };

            if max_score >= confidence_threshold {
                let cx = view[[0, i]];
                let cy = view[[1, i]];
                let w = view[[2, i]];
                let h = view[[3, i]];

                candidates.push(Candidate {
                    class_id: class_id as u32,
                    confidence: max_score,
                    bbox: [
                        (cx - w / 2.0) * sx,
                        (cy - h / 2.0) * sy,
                        (cx + w / 2.0) * sx,
                        (cy + h / 2.0) * sy,
                    ],
                });
            }
        }

        Ok(candidates)
    }

    fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
        let x1 = box1[0].max(box2[0]);
        let y1 = box1[1].max(box2[1]);
        let x2 = box1[2].min(box2[2]);
        let y2 = box1[3].min(box2[3]);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
        let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
        let union = area1 + area2 - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    fn nms(candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
        if candidates.is_empty() {
            return vec![];
        }

        trace!(
            "NMS: Processing {} candidates with IoU threshold={}",
            candidates.len(),
            iou_threshold
        );

        let mut sorted = candidates;
        sorted.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut keep = Vec::new();
        let mut suppressed = vec![false; sorted.len()];

        for i in 0..sorted.len() {
            if suppressed[i] {
                continue;
            }

            keep.push(sorted[i].clone());

            for j in (i + 1)..sorted.len() {
                if !suppressed[j] {
                    let iou = Self::calculate_iou(&sorted[i].bbox, &sorted[j].bbox);
                    if iou > iou_threshold {
                        suppressed[j] = true;
                    }
                }
            }
        }

        debug!("NMS: Kept {}/{} candidates", keep.len(), sorted.len());
        keep
    }
}

impl ObjectDetector for YoloDetector {
    fn predict(
        &self,
        img: &DynamicImage,
        confidence_threshold: f32,
        iou_threshold: f32,
    ) -> DetectionResult<RawPrediction> {
        let prediction_start = std::time::Instant::now();

        let preprocessed = self.preprocess_image(img);
        let input_shape = vec![1i64, 3, self.input_size as i64, self.input_size as i64];
        let (input_data, _) = preprocessed.into_raw_vec_and_offset();
        let input_tensor = Value::from_array((input_shape, input_data))?;

        debug!("Running ONNX inference on {}...", self.device_type);
        let inference_start = std::time::Instant::now();

        // Serialize inference through the session mutex; copy the output out
        // while the session is borrowed.
        let (dims, output_data) = {
            let mut session = self.session.lock();
            let outputs = session.run(ort::inputs![input_tensor])?;
            let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
            let dims: Vec<usize> = shape.into_iter().map(|&x| x as usize).collect();
            (dims, data.to_vec())
        };

        debug!(
            "✓ Inference completed in {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        if dims.len() != 3 || dims[0] != 1 {
            return Err(DetectionError::Postprocess(format!(
                "expected [1, 4+classes, candidates] output, got {:?}",
                dims
            )));
        }

        let array_view = ArrayViewD::from_shape(IxDyn(&dims), output_data.as_slice())
            .map_err(|e| DetectionError::Postprocess(e.to_string()))?;
        let view = array_view.index_axis(Axis(0), 0);

        let candidates =
            self.decode_output(&view, img.width(), img.height(), confidence_threshold)?;
        let kept = Self::nms(candidates, iou_threshold);

        // Render the annotated frame alongside the structured results
        let detections: Vec<Detection> = kept
            .iter()
            .map(|c| Detection {
                class_id: c.class_id,
                class_name: labels::class_name(c.class_id).to_string(),
                confidence: c.confidence,
                bbox: BBox {
                    x1: c.bbox[0],
                    y1: c.bbox[1],
                    x2: c.bbox[2],
                    y2: c.bbox[3],
                },
            })
            .collect();

        let mut annotated = img.to_rgb8();
        annotate::draw_detections(&mut annotated, &detections);

        debug!(
            "✓ Prediction completed in {:.2}ms: {} objects",
            prediction_start.elapsed().as_secs_f64() * 1000.0,
            kept.len()
        );

        Ok(RawPrediction {
            class_ids: kept.iter().map(|c| c.class_id).collect(),
            confidences: kept.iter().map(|c| c.confidence).collect(),
            boxes: kept.iter().map(|c| c.bbox).collect(),
            annotated,
        })
    }

    fn is_loaded(&self) -> bool {
        true
    }
}
