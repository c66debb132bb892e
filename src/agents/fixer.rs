//! Tier 3 fixer
//!
//! Proposes a fix for a root-cause report as a pull request. The fixer
//! never merges; a human reviews every change.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::AppResult;
use crate::llm::ReasoningClient;
use crate::mcp::{aggregate, filter_by_name, ToolBackends};

use super::{EnvironmentContext, RemediationStage};

const SESSION_NAME: &str = "Fixer";

/// Summary returned when the session produced no text
pub const EMPTY_SUMMARY: &str = "No remediation summary provided.";

pub struct Fixer {
    reasoning: Arc<dyn ReasoningClient>,
    backends: Arc<dyn ToolBackends>,
    context: EnvironmentContext,
    /// Tool names the fixer may use; empty allows every tool
    allowed_tools: Vec<String>,
}

impl Fixer {
    pub fn new(
        reasoning: Arc<dyn ReasoningClient>,
        backends: Arc<dyn ToolBackends>,
        context: EnvironmentContext,
        allowed_tools: Vec<String>,
    ) -> Self {
        Self {
            reasoning,
            backends,
            context,
            allowed_tools,
        }
    }

    pub fn instruction(&self) -> String {
        let ctx = &self.context;
        format!(
            "You are a Senior SRE 'Fixer' Agent. Your goal is to apply automated remediation to identified infrastructure or code issues.\n\
             \n\
             CRITICAL INSTRUCTIONS:\n\
             1. READ THE RCA: Carefully analyze the Root Cause Analysis provided.\n\
             2. USE GITHUB TOOLS: You have access to GitHub tools.\n\
             3. CREATE A BRANCH: Always create a new branch for your fix (e.g., 'fix/cpu-spike-remediation').\n\
             4. COMMIT THE FIX: Use 'create_or_update_file' to apply code or configuration changes.\n\
             5. OPEN A PULL REQUEST: Use 'create_pull_request' to propose the fix against the 'main' branch.\n\
             6. DO NOT MERGE: Your responsibility ends at creating the PR. A human must review and merge.\n\
             \n\
             Available Context:\n\
             - Target Resource: {target}\n\
             - Resource Group: {rg}\n\
             - GitHub Repository: {repo}\n\
             \n\
             Your output should be a summary of the PR you created.",
            target = ctx.target_resource,
            rg = ctx.resource_group,
            repo = ctx.repository,
        )
    }
}

/// User turn handed to the fixer session
pub fn remediation_request(report: &str) -> String {
    format!("Please remediate the following RCA:\n\n{}", report)
}

#[async_trait]
impl RemediationStage for Fixer {
    #[instrument(skip(self, report, cancel))]
    async fn remediate(&self, report: &str, cancel: &CancellationToken) -> AppResult<String> {
        info!("Fixer starting remediation");

        let clients = self.backends.active_clients().await;
        let tools = filter_by_name(aggregate(&clients, cancel).await?, &self.allowed_tools);
        info!(tools = tools.len(), "Fixer tools aggregated");

        let session = self.reasoning.create_session(&self.instruction(), SESSION_NAME);
        let summary = session
            .run(&remediation_request(report), &tools, cancel)
            .await?
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| EMPTY_SUMMARY.to_string());

        Ok(summary)
    }
}
