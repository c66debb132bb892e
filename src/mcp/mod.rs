//! Tool-invocation layer
//!
//! MCP clients, the per-backend client cache and tool aggregation.

pub mod client;
pub mod registry;
pub mod service;
pub mod stdio;
pub mod types;

pub use client::ToolClient;
pub use registry::{aggregate, filter_by_name, BoundTool};
pub use service::{BackendKey, ClientCache, McpService, ToolBackends};
pub use stdio::{StdioMcpClient, StdioTransportOptions};
pub use types::{ArgValue, CallToolResult, ContentBlock, ToolArgs, ToolDescriptor};
