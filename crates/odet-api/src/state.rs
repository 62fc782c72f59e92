//! Application state.

use std::sync::Arc;

use odet_vision::DetectionEngine;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub engine: Arc<DetectionEngine>,
}

impl AppState {
    pub fn new(config: ApiConfig, engine: DetectionEngine) -> Self {
        Self {
            config,
            engine: Arc::new(engine),
        }
    }
}
