// Entry point for the object detection API server

use detection_api::{
    api,
    core::{types::AppState, Config},
    orchestration::DetectionOrchestrator,
    services::detection::{ObjectDetector, YoloDetector},
};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "detection_api={},ort=off",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting object detection API...");
    info!("Model path: {}", config.detection.model_path.display());

    // Load the model before accepting traffic; a missing or broken artifact
    // aborts startup instead of failing every request later.
    let detector = YoloDetector::load(&config.detection.model_path, config.detection.input_size)
        .context("Failed to load detection model")?;
    let detector: Arc<dyn ObjectDetector> = Arc::new(detector);

    let orchestrator = Arc::new(DetectionOrchestrator::new(detector, Arc::clone(&config)));
    let state = AppState {
        config: Arc::clone(&config),
        orchestrator,
    };

    let app = api::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /                                  - Demo page");
    info!("  GET  {}/detection/health        - Health check", config.api.v1_prefix);
    info!("  POST {}/detection/detect        - Detect objects (JSON)", config.api.v1_prefix);
    info!("  POST {}/detection/detect/image  - Detect objects (annotated JPEG)", config.api.v1_prefix);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
