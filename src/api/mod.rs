// HTTP surface: routes, upload validation, error-to-status mapping.
//
// Validation of the multipart payload and threshold query parameters happens
// here, before the orchestrator is invoked; invalid input never reaches it.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::core::errors::PipelineError;
use crate::core::types::{AppState, DetectionResponse, HealthResponse, ThresholdParams};
use crate::utils::image_ops;

/// Upload size cap for multipart bodies.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Error response carrying a `{"detail": msg}` JSON body, the shape clients
/// of this service already consume.
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let detection_routes = Router::new()
        .route("/detection/detect", post(detect))
        .route("/detection/detect/image", post(detect_with_image))
        .route("/detection/health", get(health));

    Router::new()
        .nest(&state.config.api.v1_prefix, detection_routes)
        .route("/", get(demo_page))
        .route("/demo", get(demo_page))
        .nest_service("/static", ServeDir::new("static"))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Detect objects in an uploaded image, returning structured JSON.
async fn detect(
    State(state): State<AppState>,
    Query(params): Query<ThresholdParams>,
    multipart: Multipart,
) -> Result<Json<DetectionResponse>, ApiError> {
    validate_thresholds(&params)?;
    let image_bytes = read_image_field(multipart).await?;

    let outcome = state
        .orchestrator
        .run_detection(image_bytes, params)
        .await
        .map_err(map_pipeline_error)?;

    info!("Detection completed: {} objects", outcome.count);
    Ok(Json(DetectionResponse::new(outcome.detections, outcome.count)))
}

/// Detect objects and return the annotated image as JPEG bytes.
async fn detect_with_image(
    State(state): State<AppState>,
    Query(params): Query<ThresholdParams>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    validate_thresholds(&params)?;
    let image_bytes = read_image_field(multipart).await?;

    let outcome = state
        .orchestrator
        .run_detection(image_bytes, params)
        .await
        .map_err(map_pipeline_error)?;

    let jpeg = image_ops::encode_jpeg_async(outcome.annotated)
        .await
        .map_err(|e| {
            error!("Failed to encode annotated image: {}", e);
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing image: {}", e),
            )
        })?;

    info!("Annotated image returned: {} objects, {} bytes", outcome.count, jpeg.len());
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response())
}

/// Health check endpoint. Always 200.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: state.orchestrator.model_loaded(),
        model_path: state.config.detection.model_path.display().to_string(),
    })
}

/// Serve the demo page when present, else point at the API.
async fn demo_page(State(state): State<AppState>) -> Response {
    match tokio::fs::read_to_string("static/demo.html").await {
        Ok(contents) => Html(contents).into_response(),
        Err(_) => Json(serde_json::json!({
            "message": "Object Detection API",
            "api": state.config.api.v1_prefix,
        }))
        .into_response(),
    }
}

/// Range-check optional threshold overrides. Out-of-range values are rejected,
/// never clamped or forwarded.
fn validate_thresholds(params: &ThresholdParams) -> Result<(), ApiError> {
    if let Some(conf) = params.confidence_threshold {
        if !(0.0..=1.0).contains(&conf) {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "confidence_threshold must be between 0.0 and 1.0",
            ));
        }
    }
    if let Some(iou) = params.iou_threshold {
        if !(0.0..=1.0).contains(&iou) {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "iou_threshold must be between 0.0 and 1.0",
            ));
        }
    }
    Ok(())
}

/// Pull the `file` field out of the multipart form. Missing field is a 422,
/// a non-image declared content type is a 400.
async fn read_image_field(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let is_image = field
            .content_type()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(ApiError::new(StatusCode::BAD_REQUEST, "File must be an image"));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("Read error: {}", e)))?;
        return Ok(data.to_vec());
    }

    Err(ApiError::new(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Missing required upload field 'file'",
    ))
}

fn map_pipeline_error(err: PipelineError) -> ApiError {
    if err.is_client_error() {
        ApiError::new(StatusCode::BAD_REQUEST, err.to_string())
    } else {
        error!("Detection pipeline failed: {}", err);
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error processing image: {}", err),
        )
    }
}
