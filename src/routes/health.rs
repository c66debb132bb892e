//! Health check endpoints
//!
//! - `/health` - Service health with the latest watchdog cycle
//! - `/health/live` - Liveness check
//! - `/status` - Full status board snapshot

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::watchdog::{CycleReport, StatusSnapshot};
use crate::AppState;

/// Health status enum
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Watchdog counters
#[derive(Debug, Serialize)]
pub struct HealthStats {
    pub uptime_seconds: u64,
    pub cycles_total: u64,
    pub cycles_errored: u64,
    pub remediations_total: u64,
}

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub last_cycle: Option<CycleReport>,
    pub stats: HealthStats,
}

/// Simple health response for liveness
#[derive(Debug, Serialize)]
pub struct SimpleHealthResponse {
    pub status: HealthStatus,
}

/// Full health check endpoint
///
/// Reports `degraded` when the latest cycle errored. The service itself is
/// still up, so the status code stays 200.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.status.snapshot();
    let uptime = state.start_time.elapsed().as_secs();

    let status = if state.status.is_degraded() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        timestamp: chrono::Utc::now().to_rfc3339(),
        stats: HealthStats {
            uptime_seconds: uptime,
            cycles_total: snapshot.cycles_total,
            cycles_errored: snapshot.cycles_errored,
            remediations_total: snapshot.remediations_total,
        },
        last_cycle: snapshot.last_cycle,
    };

    (StatusCode::OK, Json(response))
}

/// Liveness check endpoint
pub async fn liveness_check() -> (StatusCode, Json<SimpleHealthResponse>) {
    (
        StatusCode::OK,
        Json(SimpleHealthResponse {
            status: HealthStatus::Healthy,
        }),
    )
}

/// Status board snapshot
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot())
}
