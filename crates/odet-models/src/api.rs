//! HTTP request and response payloads.
//!
//! Every response is wrapped in an [`ApiEnvelope`]:
//! - success: `{"success": true, "data": ...}`
//! - failure: `{"success": false, "error": {"message": ..., "code": ...}}`

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::detection::Detection;

/// Body of `POST /api/detect` and `POST /api/detect/stream`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, JsonSchema)]
pub struct DetectRequest {
    /// Base64 image, optionally with a `data:image/...;base64,` prefix
    #[serde(default)]
    pub image: Option<String>,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default)]
    pub confidence_threshold: Option<f32>,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default)]
    pub iou_threshold: Option<f32>,
    /// Opaque client value echoed by the stream endpoint
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
}

impl DetectRequest {
    /// The image payload, if present and non-blank.
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Detection result payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DetectionData {
    pub detections: Vec<Detection>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<serde_json::Value>,
}

impl DetectionData {
    pub fn new(detections: Vec<Detection>) -> Self {
        let count = detections.len();
        Self {
            detections,
            count,
            timestamp: None,
        }
    }

    /// Attach an echoed timestamp; `None` is emitted as JSON `null`.
    pub fn with_timestamp(mut self, timestamp: Option<serde_json::Value>) -> Self {
        self.timestamp = Some(timestamp.unwrap_or(serde_json::Value::Null));
        self
    }
}

/// Health state reported by `GET /api/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    ModelNotLoaded,
}

/// Health payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthData {
    pub status: HealthStatus,
    pub model_loaded: bool,
    pub message: String,
}

impl HealthData {
    pub fn from_loaded(model_loaded: bool) -> Self {
        if model_loaded {
            Self {
                status: HealthStatus::Healthy,
                model_loaded,
                message: "Detector is ready".to_string(),
            }
        } else {
            Self {
                status: HealthStatus::ModelNotLoaded,
                model_loaded,
                message: "Model not loaded".to_string(),
            }
        }
    }
}

/// Error detail inside a failed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
}

/// Uniform response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed envelope; `code` defaults to `ERROR_<status>` at the call site.
    pub fn err(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                message: message.into(),
                code: code.into(),
            }),
        }
    }
}
