//! Axum HTTP API for the detection service.
//!
//! This crate provides:
//! - Health, model info and detection endpoints under `/api`
//! - A uniform `{success, data | error}` response envelope
//! - CORS, security headers, request IDs and body limits
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, EngineConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
