//! Detection handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use odet_models::{ApiEnvelope, DetectRequest, Detection, DetectionData, DetectionMode};
use odet_vision::VisionError;
use tracing::debug;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Full-fidelity detection on the uploaded image.
pub async fn detect(
    State(state): State<AppState>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> ApiResult<Json<ApiEnvelope<DetectionData>>> {
    let Json(request) = payload?;
    let detections = run_detection(&state, &request, DetectionMode::Full).await?;

    Ok(Json(ApiEnvelope::ok(DetectionData::new(detections))))
}

/// Low-latency detection for video frames.
///
/// The request's `timestamp` is echoed back (null when absent) so clients
/// can match responses to frames.
pub async fn detect_stream(
    State(state): State<AppState>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> ApiResult<Json<ApiEnvelope<DetectionData>>> {
    let Json(request) = payload?;
    let detections = run_detection(&state, &request, DetectionMode::Stream).await?;

    let data = DetectionData::new(detections).with_timestamp(request.timestamp);
    Ok(Json(ApiEnvelope::ok(data)))
}

async fn run_detection(
    state: &AppState,
    request: &DetectRequest,
    mode: DetectionMode,
) -> ApiResult<Vec<Detection>> {
    let image = request
        .image()
        .ok_or_else(|| ApiError::bad_request("No image data provided"))?
        .to_string();
    request.validate()?;

    if !state.engine.is_loaded() {
        return Err(ApiError::ServiceUnavailable(VisionError::ModelNotLoaded.to_string()));
    }

    let thresholds = mode
        .default_thresholds()
        .with_overrides(request.confidence_threshold, request.iou_threshold);
    let engine = Arc::clone(&state.engine);

    // Decoding and inference are CPU-bound
    let detections = tokio::task::spawn_blocking(move || {
        let raster = odet_vision::decode(&image)?;
        debug!(
            mode = %mode,
            width = raster.width(),
            height = raster.height(),
            "Image decoded"
        );
        match mode {
            DetectionMode::Full => engine.detect(&raster, thresholds.confidence, thresholds.iou),
            DetectionMode::Stream => {
                engine.detect_fast(&raster, thresholds.confidence, thresholds.iou)
            }
        }
    })
    .await
    .map_err(|e| ApiError::internal(format!("Detection task failed: {}", e)))??;

    Ok(detections)
}
