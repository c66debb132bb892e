//! MCP client over a child process' stdio
//!
//! Speaks newline-delimited JSON-RPC 2.0: one JSON message per line on the
//! server's stdin and stdout. One request is in flight per connection;
//! responses carrying other ids and server notifications are skipped.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, AppResult};

use super::client::ToolClient;
use super::types::{CallToolResult, ToolArgs, ToolDescriptor};

/// MCP protocol revision announced during the handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// How to launch an MCP server process
#[derive(Debug, Clone, PartialEq)]
pub struct StdioTransportOptions {
    /// Executable to run
    pub command: String,
    /// Arguments passed to the executable
    pub args: Vec<String>,
    /// Extra environment variables for the child
    pub env: BTreeMap<String, String>,
}

/// JSON-RPC 2.0 request or notification (no id)
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// Any JSON-RPC 2.0 message coming from the server
#[derive(Debug, Deserialize)]
struct JsonRpcMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
    #[serde(default)]
    next_cursor: Option<String>,
}

type BoxedReader = Box<dyn AsyncBufRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Both directions of one server connection
struct Channel {
    lines: Lines<BoxedReader>,
    writer: BoxedWriter,
}

impl Channel {
    async fn send(&mut self, frame: &JsonRpcRequest<'_>) -> AppResult<()> {
        let mut payload = serde_json::to_vec(frame)?;
        payload.push(b'\n');
        self.writer
            .write_all(&payload)
            .await
            .map_err(|e| AppError::ToolTransport(format!("write failed: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| AppError::ToolTransport(format!("flush failed: {}", e)))
    }

    async fn read_response(&mut self, server: &str, id: u64) -> AppResult<Value> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| AppError::ToolTransport(format!("read failed: {}", e)))?
                .ok_or_else(|| {
                    AppError::ToolTransport(format!("{} closed its output stream", server))
                })?;

            if line.trim().is_empty() {
                continue;
            }

            let message: JsonRpcMessage = match serde_json::from_str(&line) {
                Ok(m) => m,
                Err(e) => {
                    debug!(server = %server, error = %e, "Skipping non JSON-RPC line");
                    continue;
                }
            };

            match (&message.method, &message.id) {
                // Server-initiated request; only ping needs an answer from us
                (Some(method), Some(request_id)) => {
                    if method == "ping" {
                        let pong = json!({"jsonrpc": "2.0", "id": request_id, "result": {}});
                        let mut payload = serde_json::to_vec(&pong)?;
                        payload.push(b'\n');
                        self.writer.write_all(&payload).await?;
                        self.writer.flush().await?;
                    } else {
                        debug!(server = %server, method = %method, "Ignoring server request");
                    }
                }
                (Some(method), None) => {
                    debug!(server = %server, method = %method, "Server notification");
                }
                (None, Some(response_id)) if response_id.as_u64() == Some(id) => {
                    if let Some(error) = message.error {
                        return Err(AppError::ToolFailed(format!(
                            "{} ({})",
                            error.message, error.code
                        )));
                    }
                    return Ok(message.result.unwrap_or(Value::Null));
                }
                (None, other) => {
                    debug!(server = %server, id = ?other, expected = id, "Skipping stale response");
                }
            }
        }
    }
}

/// Tool client backed by an MCP server speaking JSON-RPC over stdio
pub struct StdioMcpClient {
    name: String,
    channel: Mutex<Channel>,
    next_id: AtomicU64,
    /// Held so the server process lives (and dies) with the client
    _child: Option<Child>,
}

impl StdioMcpClient {
    /// Launch the server process and perform the MCP handshake
    ///
    /// The process is killed if `cancel` fires before the handshake ends.
    #[instrument(skip(options, cancel), fields(command = %options.command))]
    pub async fn spawn(
        name: &str,
        options: &StdioTransportOptions,
        cancel: &CancellationToken,
    ) -> AppResult<Self> {
        let mut child = Command::new(&options.command)
            .args(&options.args)
            .envs(&options.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::ToolTransport(format!("failed to start {}: {}", options.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::ToolTransport("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::ToolTransport("child stdout unavailable".to_string()))?;

        // Server diagnostics go to stderr; surface them at debug level
        if let Some(stderr) = child.stderr.take() {
            let server = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = %server, "{}", line);
                }
            });
        }

        let client = Self::from_io(name, BufReader::new(stdout), stdin, Some(child));
        client.initialize(cancel).await?;
        Ok(client)
    }

    /// Perform the MCP handshake over already-connected streams
    pub async fn connect_io<R, W>(
        name: &str,
        reader: R,
        writer: W,
        cancel: &CancellationToken,
    ) -> AppResult<Self>
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let client = Self::from_io(name, reader, writer, None);
        client.initialize(cancel).await?;
        Ok(client)
    }

    fn from_io<R, W>(name: &str, reader: R, writer: W, child: Option<Child>) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: BoxedReader = Box::new(reader);
        Self {
            name: name.to_string(),
            channel: Mutex::new(Channel {
                lines: reader.lines(),
                writer: Box::new(writer),
            }),
            next_id: AtomicU64::new(1),
            _child: child,
        }
    }

    async fn initialize(&self, cancel: &CancellationToken) -> AppResult<()> {
        let result = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "opswatch",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                })),
                cancel,
            )
            .await?;

        let server_name = result
            .pointer("/serverInfo/name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let server_protocol = result
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        info!(
            backend = %self.name,
            server = %server_name,
            protocol = %server_protocol,
            "MCP handshake complete"
        );

        let mut channel = self.channel.lock().await;
        channel
            .send(&JsonRpcRequest {
                jsonrpc: "2.0",
                id: None,
                method: "notifications/initialized",
                params: None,
            })
            .await
    }

    /// Send a request and wait for its response
    ///
    /// Cancellation only interrupts the wait. A frame that has started is
    /// always written whole, and the late response is skipped as stale by
    /// the next request.
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> AppResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        };

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut channel = self.channel.lock().await;
        channel.send(&frame).await?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(backend = %self.name, method = %method, "MCP request cancelled");
                Err(AppError::Cancelled)
            }
            result = channel.read_response(&self.name, id) => result,
        }
    }
}

#[async_trait]
impl ToolClient for StdioMcpClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, cancel), fields(backend = %self.name))]
    async fn list_tools(&self, cancel: &CancellationToken) -> AppResult<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.take().map(|c| json!({ "cursor": c }));
            let result = self.request("tools/list", params, cancel).await?;
            let page: ListToolsResult = serde_json::from_value(result).map_err(|e| {
                AppError::Protocol(format!("invalid tools/list result: {}", e))
            })?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(count = tools.len(), "Listed tools");
        Ok(tools)
    }

    #[instrument(skip(self, args, cancel), fields(backend = %self.name, tool = %name))]
    async fn call_tool(
        &self,
        name: &str,
        args: ToolArgs,
        cancel: &CancellationToken,
    ) -> AppResult<CallToolResult> {
        let params = json!({ "name": name, "arguments": args });
        let result = self.request("tools/call", Some(params), cancel).await?;

        serde_json::from_value(result)
            .map_err(|e| AppError::Protocol(format!("invalid tools/call result: {}", e)))
    }
}
