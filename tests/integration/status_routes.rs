//! Status server integration tests
//!
//! Tests for the read-only HTTP surface:
//! - GET /health - Service health with the latest cycle
//! - GET /health/live - Liveness check
//! - GET /status - Status board snapshot
//! - GET /metrics - Prometheus metrics

use std::sync::Arc;

use axum_test::TestServer;
use chrono::Utc;
use opswatch::routes::{create_router, metrics::init_metrics};
use opswatch::testing::{FakeBackends, ScriptedReasoning};
use opswatch::watchdog::CycleReport;
use opswatch::{build_watchdog, AppState, StatusBoard};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::common::{azure_backend, github_backend, metrics_payload, test_config};

fn server_with(status: Arc<StatusBoard>) -> TestServer {
    let state = Arc::new(AppState::new(test_config("http://unused"), status));
    TestServer::new(create_router(state)).expect("Failed to create test server")
}

fn report(outcome: &str, errored: bool) -> CycleReport {
    let now = Utc::now();
    CycleReport {
        cycle_id: Uuid::new_v4(),
        started_at: now,
        finished_at: now,
        duration_ms: 12,
        outcome: outcome.to_string(),
        detail: errored.then(|| "Tool transport error: github server exited".to_string()),
        errored,
    }
}

// =============================================================================
// /health
// =============================================================================

#[tokio::test]
async fn test_health_before_first_cycle() {
    let server = server_with(Arc::new(StatusBoard::new()));

    let response = server.get("/health").await;
    response.assert_status_ok();

    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["last_cycle"].is_null());
    assert_eq!(json["stats"]["cycles_total"], 0);
    assert!(json.get("timestamp").is_some(), "Response should have 'timestamp' field");
}

#[tokio::test]
async fn test_health_degraded_after_errored_cycle() {
    let status = Arc::new(StatusBoard::new());
    status.record(report("remediated", false));
    status.record(report("failed", true));
    let server = server_with(status);

    let response = server.get("/health").await;

    // Degraded is informational; the service itself is up.
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["last_cycle"]["outcome"], "failed");
    assert_eq!(json["stats"]["cycles_total"], 2);
    assert_eq!(json["stats"]["cycles_errored"], 1);
    assert_eq!(json["stats"]["remediations_total"], 1);
}

#[tokio::test]
async fn test_health_recovers_after_clean_cycle() {
    let status = Arc::new(StatusBoard::new());
    status.record(report("failed", true));
    status.record(report("healthy", false));
    let server = server_with(status);

    let json: Value = server.get("/health").await.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_health_live_endpoint() {
    let status = Arc::new(StatusBoard::new());
    status.record(report("panicked", true));
    let server = server_with(status);

    let response = server.get("/health/live").await;
    response.assert_status_ok();

    let json: Value = response.json();
    assert_eq!(json, serde_json::json!({"status": "healthy"}));
}

// =============================================================================
// /status
// =============================================================================

#[tokio::test]
async fn test_status_reflects_watchdog_cycle() {
    let config = test_config("http://unused");
    let status = Arc::new(StatusBoard::new());
    let backends = Arc::new(FakeBackends::with_clients(vec![
        azure_backend(metrics_payload(12.0)),
        github_backend(),
    ]));
    let watchdog = build_watchdog(
        &config,
        backends,
        Arc::new(ScriptedReasoning::replying(None)),
        status.clone(),
    );
    let cycle = watchdog.run_cycle(&CancellationToken::new()).await;

    let server = server_with(status);
    let response = server.get("/status").await;
    response.assert_status_ok();

    let json: Value = response.json();
    assert_eq!(json["cycles_total"], 1);
    assert_eq!(json["cycles_errored"], 0);
    assert_eq!(json["last_cycle"]["outcome"], "healthy");
    assert_eq!(json["last_cycle"]["cycle_id"], cycle.cycle_id.to_string());
    assert!(json["last_cycle"].get("detail").is_none());
}

// =============================================================================
// /metrics
// =============================================================================

#[tokio::test]
async fn test_metrics_endpoint_exposes_cycle_counters() {
    init_metrics();

    let config = test_config("http://unused");
    let status = Arc::new(StatusBoard::new());
    let backends = Arc::new(FakeBackends::with_clients(vec![azure_backend(
        metrics_payload(12.0),
    )]));
    build_watchdog(
        &config,
        backends,
        Arc::new(ScriptedReasoning::replying(None)),
        status.clone(),
    )
    .run_cycle(&CancellationToken::new())
    .await;

    let server = server_with(status);
    let response = server.get("/metrics").await;
    response.assert_status_ok();

    let body = response.text();
    assert!(body.contains("opswatch_cycles_total"), "metrics body: {}", body);
    assert!(body.contains("outcome=\"healthy\""));
}
