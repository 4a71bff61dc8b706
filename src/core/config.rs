use crate::core::errors::{ConfigError, ConfigResult};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: Level,
}

/// Detection configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub model_path: PathBuf,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Square input resolution expected by the model.
    pub input_size: u32,
    /// Max width/height accepted for uploaded images.
    pub max_image_dimension: u32,
    pub inference_timeout_secs: u64,
}

/// API surface configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub v1_prefix: String,
}

/// Main application configuration
///
/// Loaded once at startup and shared read-only via `Arc` afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub detection: DetectionConfig,
    pub api: ApiConfig,
}

/// Read an env var and parse it, distinguishing absent (use default) from
/// malformed (fail fast). Absent-but-garbage values must never silently fall
/// back to a default.
fn env_parse<T: FromStr>(key: &'static str, default: T) -> ConfigResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Malformed { key, value: raw }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn new() -> ConfigResult<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> ConfigResult<Self> {
        let log_level = match env::var("LOG_LEVEL") {
            Ok(raw) => match raw.to_lowercase().as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "warn" | "warning" => Level::WARN,
                "error" => Level::ERROR,
                _ => {
                    return Err(ConfigError::Malformed {
                        key: "LOG_LEVEL",
                        value: raw,
                    })
                }
            },
            Err(_) => Level::INFO,
        };

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parse("SERVER_PORT", 8000)?,
                log_level,
            },
            detection: DetectionConfig {
                model_path: PathBuf::from(
                    env::var("MODEL_PATH").unwrap_or_else(|_| "models/yolo26s.onnx".to_string()),
                ),
                confidence_threshold: env_parse("CONFIDENCE_THRESHOLD", 0.25)?,
                iou_threshold: env_parse("IOU_THRESHOLD", 0.45)?,
                input_size: env_parse("INPUT_SIZE", 640)?,
                max_image_dimension: env_parse("MAX_IMAGE_SIZE", 1920)?,
                inference_timeout_secs: env_parse("INFERENCE_TIMEOUT_SECS", 30)?,
            },
            api: ApiConfig {
                v1_prefix: env::var("API_V1_STR").unwrap_or_else(|_| "/api/v1".to_string()),
            },
        })
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(ConfigError::InvalidConfidenceThreshold(
                self.detection.confidence_threshold,
            ));
        }

        if !(0.0..=1.0).contains(&self.detection.iou_threshold) {
            return Err(ConfigError::InvalidIoUThreshold(
                self.detection.iou_threshold,
            ));
        }

        if self.detection.max_image_dimension == 0 {
            return Err(ConfigError::InvalidMaxImageDimension);
        }

        if self.detection.input_size == 0 {
            return Err(ConfigError::InvalidInputSize);
        }

        Ok(())
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.detection.confidence_threshold
    }

    pub fn iou_threshold(&self) -> f32 {
        self.detection.iou_threshold
    }

    pub fn max_image_dimension(&self) -> u32 {
        self.detection.max_image_dimension
    }
}
