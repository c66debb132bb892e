//! Tool client abstraction
//!
//! Defines the trait every tool-invocation backend implements so the
//! watchdog and the agents never depend on how a backend is transported.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;

use super::types::{CallToolResult, ToolArgs, ToolDescriptor};

/// Trait defining the interface for tool-invocation clients
///
/// Implementations talk to one backend (an MCP server process, a test
/// double, ...) and expose its tools by name.
#[async_trait]
pub trait ToolClient: Send + Sync {
    /// Backend identity for logging
    fn name(&self) -> &str;

    /// List the tools offered by this backend
    async fn list_tools(&self, cancel: &CancellationToken) -> AppResult<Vec<ToolDescriptor>>;

    /// Invoke a tool by name
    ///
    /// Transport failures and server-side protocol errors are returned as
    /// `Err`. A tool that ran but reported failure comes back as `Ok` with
    /// `is_error` set.
    async fn call_tool(
        &self,
        name: &str,
        args: ToolArgs,
        cancel: &CancellationToken,
    ) -> AppResult<CallToolResult>;
}
