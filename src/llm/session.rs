//! Reasoning client abstraction
//!
//! The stages only depend on these traits. How a session decides which tools
//! to call, and how often, is up to the implementation.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::mcp::BoundTool;

/// Factory for reasoning sessions
pub trait ReasoningClient: Send + Sync {
    /// Start a session with a fixed system instruction
    fn create_session(&self, instruction: &str, name: &str) -> Box<dyn ReasoningSession>;
}

/// One reasoning session
#[async_trait]
pub trait ReasoningSession: Send + Sync {
    /// Answer `user_input`, calling `tools` as needed
    ///
    /// Returns the final text, or `None` when the model produced no text.
    async fn run(
        &self,
        user_input: &str,
        tools: &[BoundTool],
        cancel: &CancellationToken,
    ) -> AppResult<Option<String>>;
}
