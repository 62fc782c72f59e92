//! Model information handler.

use axum::extract::State;
use axum::Json;
use odet_models::{ApiEnvelope, ModelInfo};

use crate::state::AppState;

/// Describe the loaded model: device, classes and path.
pub async fn model_info(State(state): State<AppState>) -> Json<ApiEnvelope<ModelInfo>> {
    Json(ApiEnvelope::ok(state.engine.model_info().clone()))
}
