//! HTTP routes for Opswatch
//!
//! The status server exposes health, the watchdog status board and
//! Prometheus metrics. It has no write endpoints.

pub mod health;
pub mod metrics;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Create the status router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness_check))
        .route("/status", get(health::status))
        .route("/metrics", get(metrics::prometheus_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
