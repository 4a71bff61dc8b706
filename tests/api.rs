//! Router-level tests for the detection API.
//!
//! The orchestrator is driven through a stub detector so the full HTTP path
//! (multipart parsing, validation, error mapping, response shaping) is
//! exercised without a model artifact on disk.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::Arc;
use tower::util::ServiceExt;

use detection_api::{
    api,
    core::config::{ApiConfig, Config, DetectionConfig, ServerConfig},
    core::errors::DetectionResult,
    core::types::AppState,
    DetectionOrchestrator, ObjectDetector, RawPrediction,
};

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

/// Stub detector returning a fixed prediction.
struct StubDetector {
    prediction: RawPrediction,
}

impl StubDetector {
    fn single_person() -> Self {
        Self {
            prediction: RawPrediction {
                class_ids: vec![0],
                confidences: vec![0.87],
                boxes: vec![[10.0, 12.0, 50.0, 60.0]],
                annotated: RgbImage::from_pixel(10, 10, Rgb([200, 0, 0])),
            },
        }
    }

    fn empty() -> Self {
        Self {
            prediction: RawPrediction {
                class_ids: vec![],
                confidences: vec![],
                boxes: vec![],
                annotated: RgbImage::new(10, 10),
            },
        }
    }
}

impl ObjectDetector for StubDetector {
    fn predict(
        &self,
        _img: &DynamicImage,
        _confidence_threshold: f32,
        _iou_threshold: f32,
    ) -> DetectionResult<RawPrediction> {
        Ok(self.prediction.clone())
    }

    fn is_loaded(&self) -> bool {
        true
    }
}

fn test_config() -> Arc<Config> {
    Arc::new(Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: tracing::Level::INFO,
        },
        detection: DetectionConfig {
            model_path: "models/yolo26s.onnx".into(),
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            input_size: 640,
            max_image_dimension: 1920,
            inference_timeout_secs: 30,
        },
        api: ApiConfig {
            v1_prefix: "/api/v1".to_string(),
        },
    })
}

fn app_with(detector: StubDetector) -> Router {
    let config = test_config();
    let detector: Arc<dyn ObjectDetector> = Arc::new(detector);
    let orchestrator = Arc::new(DetectionOrchestrator::new(detector, Arc::clone(&config)));
    api::router(AppState {
        config,
        orchestrator,
    })
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([40, 80, 120]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
    bytes
}

/// Build a multipart/form-data body with a single `file` part.
fn multipart_body(content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\n\
             Content-Type: {}\r\n\r\n",
            content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(content_type, data)))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_model_state() {
    let app = app_with(StubDetector::empty());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/detection/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model_loaded"], true);
    assert_eq!(json["model_path"], "models/yolo26s.onnx");
}

#[tokio::test]
async fn detect_returns_structured_detections() {
    let app = app_with(StubDetector::single_person());

    let response = app
        .oneshot(multipart_request(
            "/api/v1/detection/detect",
            "image/png",
            &png_bytes(64, 64),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["detections"].as_array().unwrap().len(), 1);
    assert_eq!(json["message"], "Detection completed successfully");

    let det = &json["detections"][0];
    assert_eq!(det["class_id"], 0);
    assert_eq!(det["class_name"], "person");
    assert!((det["confidence"].as_f64().unwrap() - 0.87).abs() < 1e-6);
    assert_eq!(det["bbox"]["x1"], 10.0);
    assert_eq!(det["bbox"]["y2"], 60.0);
}

#[tokio::test]
async fn detect_without_file_field_is_unprocessable() {
    let app = app_with(StubDetector::empty());

    let body = format!("--{}--\r\n", BOUNDARY);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/detection/detect")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Missing required upload field 'file'");
}

#[tokio::test]
async fn detect_rejects_non_image_content_type() {
    let app = app_with(StubDetector::empty());

    let response = app
        .oneshot(multipart_request(
            "/api/v1/detection/detect",
            "text/plain",
            b"hello",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let json = body_json(response).await;
    assert_eq!(json["detail"], "File must be an image");
}

#[tokio::test]
async fn detect_rejects_undecodable_image() {
    let app = app_with(StubDetector::empty());

    let response = app
        .oneshot(multipart_request(
            "/api/v1/detection/detect",
            "image/png",
            b"\x89PNG but truncated",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Could not decode image from bytes");
}

#[tokio::test]
async fn detect_rejects_out_of_range_threshold() {
    let app = app_with(StubDetector::empty());

    let response = app
        .oneshot(multipart_request(
            "/api/v1/detection/detect?confidence_threshold=1.5",
            "image/png",
            &png_bytes(8, 8),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(
        json["detail"],
        "confidence_threshold must be between 0.0 and 1.0"
    );
}

#[tokio::test]
async fn detect_rejects_non_numeric_threshold() {
    let app = app_with(StubDetector::empty());

    let response = app
        .oneshot(multipart_request(
            "/api/v1/detection/detect?iou_threshold=abc",
            "image/png",
            &png_bytes(8, 8),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn detect_image_returns_jpeg() {
    let app = app_with(StubDetector::single_person());

    let response = app
        .oneshot(multipart_request(
            "/api/v1/detection/detect/image",
            "image/png",
            &png_bytes(64, 64),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );

    // Body must re-decode as an image with the annotated frame's dimensions
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (10, 10));
}

#[tokio::test]
async fn detect_image_rejects_non_image_upload() {
    let app = app_with(StubDetector::empty());

    let response = app
        .oneshot(multipart_request(
            "/api/v1/detection/detect/image",
            "text/plain",
            b"hello",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn root_serves_api_pointer_without_demo_page() {
    let app = app_with(StubDetector::empty());

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = app_with(StubDetector::empty());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/detection/unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
