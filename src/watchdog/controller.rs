//! Escalation controller
//!
//! One long-lived loop: sample the monitored metric, classify it, and on an
//! unhealthy verdict escalate to diagnosis and then, if the diagnosis is
//! actionable, to remediation. Cycles run strictly one after another.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agents::{is_actionable, DiagnosisStage, RemediationStage};
use crate::error::{AppError, AppResult};
use crate::health::HealthClassifier;
use crate::mcp::ToolBackends;
use crate::routes::metrics::{record_cycle, record_tier_invocation};

use super::settings::WatchdogSettings;
use super::status::{CycleReport, StatusBoard};

/// Longest evidence excerpt logged and handed to diagnosis
const EVIDENCE_PREVIEW_CHARS: usize = 500;

/// How a cycle ended when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Monitoring coordinates are missing
    Skipped { missing: Vec<&'static str> },
    /// The metric could not be sampled
    SamplingFailed { reason: String },
    Healthy,
    /// Diagnosis found no actionable cause
    Inconclusive { report: String },
    Remediated { report: String, summary: String },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Skipped { .. } => "skipped",
            CycleOutcome::SamplingFailed { .. } => "sampling_failed",
            CycleOutcome::Healthy => "healthy",
            CycleOutcome::Inconclusive { .. } => "inconclusive",
            CycleOutcome::Remediated { .. } => "remediated",
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            CycleOutcome::Skipped { missing } => Some(format!("missing {}", missing.join(", "))),
            CycleOutcome::SamplingFailed { reason } => Some(reason.clone()),
            CycleOutcome::Healthy => None,
            CycleOutcome::Inconclusive { report } => Some(report.clone()),
            CycleOutcome::Remediated { summary, .. } => Some(summary.clone()),
        }
    }
}

/// The tiered escalation controller
pub struct Watchdog {
    settings: WatchdogSettings,
    backends: Arc<dyn ToolBackends>,
    classifier: HealthClassifier,
    diagnosis: Arc<dyn DiagnosisStage>,
    remediation: Arc<dyn RemediationStage>,
    status: Arc<StatusBoard>,
}

impl Watchdog {
    pub fn new(
        settings: WatchdogSettings,
        backends: Arc<dyn ToolBackends>,
        diagnosis: Arc<dyn DiagnosisStage>,
        remediation: Arc<dyn RemediationStage>,
        status: Arc<StatusBoard>,
    ) -> Self {
        Self {
            classifier: HealthClassifier::new(settings.health_threshold),
            settings,
            backends,
            diagnosis,
            remediation,
            status,
        }
    }

    pub fn status(&self) -> Arc<StatusBoard> {
        self.status.clone()
    }

    /// Run cycles until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            threshold = self.settings.health_threshold,
            monitor_tool = %self.settings.monitor_tool,
            "Watchdog starting"
        );

        while !shutdown.is_cancelled() {
            self.run_cycle(&shutdown).await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        info!("Watchdog stopped");
    }

    /// Run one cycle, containing every error and panic
    ///
    /// The report is also recorded on the status board.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("watchdog_cycle", cycle_id = %cycle_id);
        let started_at = Utc::now();
        let timer = Instant::now();

        let result = AssertUnwindSafe(self.check_metrics(cancel).instrument(span.clone()))
            .catch_unwind()
            .await;

        let (outcome, detail, errored) = span.in_scope(|| match result {
            Ok(Ok(outcome)) => (outcome.label(), outcome.detail(), false),
            Ok(Err(AppError::Cancelled)) => {
                info!("Watchdog cycle cancelled");
                ("cancelled", None, false)
            }
            Ok(Err(e)) => {
                error!(error = %e, kind = e.kind(), "Error during watchdog cycle");
                ("failed", Some(e.to_string()), true)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "Watchdog cycle panicked");
                ("panicked", Some(message), true)
            }
        });

        let elapsed = timer.elapsed();
        record_cycle(outcome, elapsed.as_secs_f64());

        let report = CycleReport {
            cycle_id,
            started_at,
            finished_at: Utc::now(),
            duration_ms: elapsed.as_millis() as u64,
            outcome: outcome.to_string(),
            detail,
            errored,
        };
        self.status.record(report.clone());
        report
    }

    /// One pass of the escalation state machine
    ///
    /// Sampling failures end the cycle with `SamplingFailed`. Remediation
    /// errors are returned. Remediation runs detached from `cancel` so a
    /// proposal that has started is allowed to finish during shutdown.
    pub async fn check_metrics(&self, cancel: &CancellationToken) -> AppResult<CycleOutcome> {
        info!("Checking metrics");

        let target = match self.settings.target() {
            Ok(target) => target,
            Err(missing) => {
                warn!(missing = ?missing, "Monitoring coordinates missing, skipping metrics check");
                return Ok(CycleOutcome::Skipped { missing });
            }
        };

        // Tier 1: sample
        let connect = self
            .backends
            .azure_client(target.subscription_id, target.tenant_id, cancel);
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            connected = connect => connected,
        };
        let client = match connected {
            Ok(client) => client,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                error!(error = %e, "Failed to connect to the monitoring backend");
                return Ok(CycleOutcome::SamplingFailed { reason: e.to_string() });
            }
        };

        let args = self.settings.monitor_args(&target);
        let sample = match client
            .call_tool(&self.settings.monitor_tool, args, cancel)
            .await
        {
            Ok(sample) if sample.is_error => {
                let reason = format!("monitoring tool reported an error: {}", sample.flatten());
                error!(tool = %self.settings.monitor_tool, reason = %reason, "Metric sampling failed");
                return Ok(CycleOutcome::SamplingFailed { reason });
            }
            Ok(sample) => sample,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                error!(tool = %self.settings.monitor_tool, error = %e, "Metric sampling failed");
                return Ok(CycleOutcome::SamplingFailed { reason: e.to_string() });
            }
        };

        let evidence = sample.flatten();
        let preview = preview(&evidence, EVIDENCE_PREVIEW_CHARS);
        info!(evidence = %preview, "Metric response");

        let verdict = self.classifier.classify(Some(&sample), target.resource);
        if verdict.is_healthy() {
            info!(basis = ?verdict.basis, "System is healthy");
            return Ok(CycleOutcome::Healthy);
        }

        warn!(
            basis = ?verdict.basis,
            target = %target.resource,
            "Anomaly detected, escalating to investigation"
        );

        // Tier 2: diagnose
        let anomaly = format!(
            "Anomaly detected: {} spike on {}. Metrics: {}",
            self.settings.metric_name, target.resource, preview
        );
        record_tier_invocation("investigate");
        let report = self.diagnosis.investigate(&anomaly, cancel).await;
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        info!(report = %report, "Investigation complete");

        if !is_actionable(&report, &self.settings.inconclusive_marker) {
            warn!("Skipping remediation: no valid root cause identified");
            return Ok(CycleOutcome::Inconclusive { report });
        }

        // Tier 3: remediate
        info!("Starting remediation");
        record_tier_invocation("remediate");
        let summary = self
            .remediation
            .remediate(&report, &CancellationToken::new())
            .await?;
        info!(summary = %summary, "Remediation complete");

        Ok(CycleOutcome::Remediated { report, summary })
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
