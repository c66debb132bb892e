//! Tool aggregation
//!
//! Flattens the tools of every active client into one list a reasoning
//! session can call. Each entry keeps a handle to the client that owns it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};
use crate::routes::metrics::record_tool_call;

use super::client::ToolClient;
use super::types::{ToolArgs, ToolDescriptor};

/// A tool descriptor bound to the client that serves it
#[derive(Clone)]
pub struct BoundTool {
    pub descriptor: ToolDescriptor,
    client: Arc<dyn ToolClient>,
}

impl BoundTool {
    pub fn new(descriptor: ToolDescriptor, client: Arc<dyn ToolClient>) -> Self {
        Self { descriptor, client }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Name of the backend serving this tool
    pub fn backend(&self) -> &str {
        self.client.name()
    }

    /// Call the tool and flatten its content blocks into one string
    ///
    /// A tool-level failure (`isError`) is still returned as text so the
    /// caller can show it to the model.
    #[instrument(skip(self, args, cancel), fields(tool = %self.descriptor.name, backend = %self.client.name()))]
    pub async fn invoke(&self, args: ToolArgs, cancel: &CancellationToken) -> AppResult<String> {
        let result = self
            .client
            .call_tool(&self.descriptor.name, args, cancel)
            .await
            .map_err(|e| {
                record_tool_call(&self.descriptor.name, e.kind());
                e
            })?;
        let label = if result.is_error { "tool_error" } else { "ok" };
        record_tool_call(&self.descriptor.name, label);
        Ok(result.flatten())
    }
}

impl std::fmt::Debug for BoundTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundTool")
            .field("name", &self.descriptor.name)
            .field("backend", &self.client.name())
            .finish()
    }
}

/// List the tools of every client and bind each to its client
///
/// Order is client order, then each client's listing order. Tools with the
/// same name on different clients are all kept. Cancelling `cancel` stops
/// the listing even when a backend never answers.
pub async fn aggregate(
    clients: &[Arc<dyn ToolClient>],
    cancel: &CancellationToken,
) -> AppResult<Vec<BoundTool>> {
    let mut tools = Vec::new();

    for client in clients {
        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            listed = client.list_tools(cancel) => listed?,
        };
        debug!(backend = %client.name(), count = listed.len(), "Aggregated tools");
        tools.extend(
            listed
                .into_iter()
                .map(|descriptor| BoundTool::new(descriptor, client.clone())),
        );
    }

    Ok(tools)
}

/// Keep only tools whose names appear in `allowed`
///
/// An empty allow-list keeps every tool.
pub fn filter_by_name(tools: Vec<BoundTool>, allowed: &[String]) -> Vec<BoundTool> {
    if allowed.is_empty() {
        return tools;
    }
    tools
        .into_iter()
        .filter(|tool| allowed.iter().any(|name| name == tool.name()))
        .collect()
}
