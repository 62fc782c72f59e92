//! Health check handler.

use axum::extract::State;
use axum::Json;
use odet_models::{ApiEnvelope, HealthData};

use crate::state::AppState;

/// Health check endpoint.
///
/// Always 200; a missing model is reported in the payload.
pub async fn health(State(state): State<AppState>) -> Json<ApiEnvelope<HealthData>> {
    Json(ApiEnvelope::ok(HealthData::from_loaded(state.engine.is_loaded())))
}
