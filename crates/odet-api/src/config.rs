//! API configuration.

use std::str::FromStr;
use std::time::Duration;

use odet_vision::{
    DetectionEngine, InferenceFailurePolicy, OnnxYoloConfig, DEFAULT_MAX_STREAM_WIDTH,
};
use tracing::warn;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Install the Prometheus recorder and serve `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: default_cors_origins(),
            request_timeout: Duration::from_secs(30),
            max_body_size: 16 * 1024 * 1024, // 16MB
            environment: "development".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT", defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| split_list(&s))
                .unwrap_or(defaults.cors_origins),
            request_timeout: Duration::from_secs(env_parse(
                "REQUEST_TIMEOUT",
                defaults.request_timeout.as_secs(),
            )),
            max_body_size: env_parse("MAX_BODY_SIZE", defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }
}

/// Detection engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model_path: String,
    /// Newline-separated label file; COCO labels when unset
    pub class_names_path: Option<String>,
    /// Square input size of the model
    pub input_size: u32,
    /// Width bound for the stream endpoint
    pub stream_max_width: u32,
    pub failure_policy: InferenceFailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let onnx = OnnxYoloConfig::default();
        Self {
            model_path: onnx.model_path,
            class_names_path: onnx.class_names_path,
            input_size: onnx.input_size,
            stream_max_width: DEFAULT_MAX_STREAM_WIDTH,
            failure_policy: InferenceFailurePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("MODEL_PATH").unwrap_or(defaults.model_path),
            class_names_path: std::env::var("CLASS_NAMES_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            input_size: env_parse("MODEL_INPUT_SIZE", defaults.input_size),
            stream_max_width: env_parse("STREAM_MAX_WIDTH", defaults.stream_max_width),
            failure_policy: env_parse("INFERENCE_FAILURE_POLICY", defaults.failure_policy),
        }
    }

    pub fn onnx(&self) -> OnnxYoloConfig {
        OnnxYoloConfig {
            model_path: self.model_path.clone(),
            class_names_path: self.class_names_path.clone(),
            input_size: self.input_size,
        }
    }

    /// Load the model and build the engine.
    ///
    /// Never fails: a model that cannot be loaded yields an engine in the
    /// load-failed state, reported through health and model info.
    pub fn build_engine(&self) -> DetectionEngine {
        DetectionEngine::from_onnx(self.onnx())
            .with_failure_policy(self.failure_policy)
            .with_max_stream_width(self.stream_max_width)
    }
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse an environment variable, keeping `default` when unset or invalid.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Invalid config value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
