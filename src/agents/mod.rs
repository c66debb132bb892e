//! Escalation stages
//!
//! Tier 2 (diagnosis) and Tier 3 (remediation). Each stage runs one
//! reasoning session over the tools of the connected backends.

pub mod fixer;
pub mod investigator;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::AppResult;

pub use fixer::Fixer;
pub use investigator::Investigator;

/// Tier 2: turn an anomaly description into a root-cause report
#[async_trait]
pub trait DiagnosisStage: Send + Sync {
    /// Never fails. Errors come back as a textual failure report.
    async fn investigate(&self, anomaly: &str, cancel: &CancellationToken) -> String;
}

/// Tier 3: act on a root-cause report
#[async_trait]
pub trait RemediationStage: Send + Sync {
    async fn remediate(&self, report: &str, cancel: &CancellationToken) -> AppResult<String>;
}

const NOT_CONFIGURED: &str = "(not configured)";

/// Static description of the monitored environment given to both stages
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentContext {
    pub subscription_id: String,
    pub tenant_id: String,
    pub resource_group: String,
    pub target_resource: String,
    pub repository: String,
}

impl EnvironmentContext {
    pub fn from_config(config: &Config) -> Self {
        let or_placeholder =
            |value: &Option<String>| value.clone().unwrap_or_else(|| NOT_CONFIGURED.to_string());

        Self {
            subscription_id: or_placeholder(&config.subscription_id),
            tenant_id: or_placeholder(&config.tenant_id),
            resource_group: or_placeholder(&config.resource_group),
            target_resource: or_placeholder(&config.target_resource),
            repository: or_placeholder(&config.github_repository),
        }
    }
}

/// Whether a root-cause report is worth acting on
///
/// Blank reports and reports containing `marker` are inconclusive.
pub fn is_actionable(report: &str, marker: &str) -> bool {
    !report.trim().is_empty() && !report.contains(marker)
}
