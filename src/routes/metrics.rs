//! Prometheus metrics endpoint
//!
//! Exposes watchdog metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "opswatch_cycles_total",
        "Watchdog cycles completed, by outcome"
    );
    metrics::describe_counter!(
        "opswatch_tier_invocations_total",
        "Escalation stage invocations, by tier"
    );
    metrics::describe_counter!(
        "opswatch_tool_calls_total",
        "Tool calls made through bound tools, by tool and result"
    );
    metrics::describe_histogram!(
        "opswatch_cycle_duration_seconds",
        "Watchdog cycle duration in seconds"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record a finished watchdog cycle
pub fn record_cycle(outcome: &str, duration_secs: f64) {
    metrics::counter!("opswatch_cycles_total", "outcome" => outcome.to_string()).increment(1);
    metrics::histogram!("opswatch_cycle_duration_seconds").record(duration_secs);
}

/// Record an escalation stage being started
pub fn record_tier_invocation(tier: &str) {
    metrics::counter!("opswatch_tier_invocations_total", "tier" => tier.to_string()).increment(1);
}

/// Record a tool call
pub fn record_tool_call(tool: &str, result: &str) {
    metrics::counter!(
        "opswatch_tool_calls_total",
        "tool" => tool.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}
