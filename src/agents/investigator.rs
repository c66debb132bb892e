//! Tier 2 investigator
//!
//! Correlates the anomaly with recent resource changes and repository
//! activity and produces a root-cause report.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::error::{AppError, AppResult};
use crate::llm::ReasoningClient;
use crate::mcp::{aggregate, ToolBackends};

use super::{DiagnosisStage, EnvironmentContext};

const SESSION_NAME: &str = "Investigator";

pub struct Investigator {
    reasoning: Arc<dyn ReasoningClient>,
    backends: Arc<dyn ToolBackends>,
    context: EnvironmentContext,
    inconclusive_marker: String,
}

impl Investigator {
    pub fn new(
        reasoning: Arc<dyn ReasoningClient>,
        backends: Arc<dyn ToolBackends>,
        context: EnvironmentContext,
        inconclusive_marker: impl Into<String>,
    ) -> Self {
        Self {
            reasoning,
            backends,
            context,
            inconclusive_marker: inconclusive_marker.into(),
        }
    }

    /// System instruction for the investigation session
    pub fn instruction(&self) -> String {
        let ctx = &self.context;
        format!(
            "You are a Senior SRE Investigator. Your goal is to find the ROOT CAUSE of the following anomaly.\n\
             \n\
             STEPS TO FOLLOW:\n\
             1. Examine Azure resources in the '{rg}' resource group to see if any deployments or configuration changes occurred.\n\
             2. Search the GitHub repository for recent commits or failed Action workflows that align with the anomaly timing.\n\
             3. Fetch logs from failed workflows if possible.\n\
             4. Output a clear, concise 'ROOT CAUSE ANALYSIS' report.\n\
             \n\
             If you cannot find a root cause, say exactly: '{marker}'.\n\
             \n\
             Azure Context:\n\
             - Subscription: {sub}\n\
             - Tenant: {tenant}\n\
             - Resource Group: {rg}\n\
             - Target Resource: {target}\n\
             - GitHub Repository: {repo}\n\
             \n\
             CRITICAL: Always pass 'subscription' and 'tenant' to Azure tools.",
            rg = ctx.resource_group,
            marker = self.inconclusive_marker,
            sub = ctx.subscription_id,
            tenant = ctx.tenant_id,
            target = ctx.target_resource,
            repo = ctx.repository,
        )
    }

    async fn run_session(&self, anomaly: &str, cancel: &CancellationToken) -> AppResult<Option<String>> {
        let clients = self.backends.active_clients().await;
        let tools = aggregate(&clients, cancel).await?;
        info!(tools = tools.len(), "Investigator tools aggregated");

        let session = self
            .reasoning
            .create_session(&self.instruction(), SESSION_NAME);
        session.run(anomaly, &tools, cancel).await
    }
}

#[async_trait]
impl DiagnosisStage for Investigator {
    #[instrument(skip(self, anomaly, cancel))]
    async fn investigate(&self, anomaly: &str, cancel: &CancellationToken) -> String {
        info!(anomaly = %anomaly, "Investigator starting");

        match self.run_session(anomaly, cancel).await {
            Ok(Some(report)) if !report.trim().is_empty() => {
                info!("Investigation complete");
                report
            }
            Ok(_) => {
                info!("Investigation produced no report");
                format!("{}.", self.inconclusive_marker)
            }
            Err(AppError::Cancelled) => {
                info!("Investigation cancelled");
                format!("Investigation cancelled. {}.", self.inconclusive_marker)
            }
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Investigation failed");
                format!("Investigation failed: {}. {}.", e, self.inconclusive_marker)
            }
        }
    }
}
