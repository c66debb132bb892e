//! Test doubles for tool backends, reasoning clients and stages
//!
//! Compiled for unit tests and, with the `test-utils` feature, for the
//! integration tests under `tests/`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agents::{DiagnosisStage, RemediationStage};
use crate::error::{AppError, AppResult};
use crate::llm::{ReasoningClient, ReasoningSession};
use crate::mcp::types::{empty_object_schema, CallToolResult, ToolArgs, ToolDescriptor};
use crate::mcp::{BoundTool, ToolBackends, ToolClient};

// =============================================================================
// Tool clients
// =============================================================================

#[derive(Clone)]
enum ScriptedCall {
    Result(CallToolResult),
    TransportError(String),
}

/// In-memory tool client with scripted results
pub struct FakeToolClient {
    name: String,
    tools: Vec<ToolDescriptor>,
    results: HashMap<String, ScriptedCall>,
    fail_listing: bool,
    stall_listing: bool,
    calls: Mutex<Vec<(String, ToolArgs)>>,
}

impl FakeToolClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tools: Vec::new(),
            results: HashMap::new(),
            fail_listing: false,
            stall_listing: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Advertise tools with the given names
    pub fn with_tools(mut self, names: &[&str]) -> Self {
        self.tools.extend(names.iter().map(|name| ToolDescriptor {
            name: name.to_string(),
            description: Some(format!("{} tool", name)),
            input_schema: empty_object_schema(),
        }));
        self
    }

    /// Script the result of calls to `tool`
    pub fn with_result(mut self, tool: &str, result: CallToolResult) -> Self {
        self.results
            .insert(tool.to_string(), ScriptedCall::Result(result));
        self
    }

    /// Make calls to `tool` fail with a transport error
    pub fn with_transport_error(mut self, tool: &str, message: &str) -> Self {
        self.results.insert(
            tool.to_string(),
            ScriptedCall::TransportError(message.to_string()),
        );
        self
    }

    /// Make tool listing fail
    pub fn failing_list(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Make tool listing never answer
    pub fn stalled_list(mut self) -> Self {
        self.stall_listing = true;
        self
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<(String, ToolArgs)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolClient for FakeToolClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self, cancel: &CancellationToken) -> AppResult<Vec<ToolDescriptor>> {
        if self.stall_listing {
            return std::future::pending().await;
        }
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.fail_listing {
            return Err(AppError::ToolTransport(format!("{} is unreachable", self.name)));
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        args: ToolArgs,
        cancel: &CancellationToken,
    ) -> AppResult<CallToolResult> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        self.calls.lock().unwrap().push((name.to_string(), args));

        match self.results.get(name) {
            Some(ScriptedCall::Result(result)) => Ok(result.clone()),
            Some(ScriptedCall::TransportError(message)) => {
                Err(AppError::ToolTransport(message.clone()))
            }
            None => Ok(CallToolResult::text(format!("{} ok", name))),
        }
    }
}

/// Backends served by fake clients
///
/// `azure_client` and `github_client` return the client named `azure` or
/// `github`. Every client is active.
#[derive(Default)]
pub struct FakeBackends {
    clients: Vec<Arc<FakeToolClient>>,
    azure_requests: Mutex<Vec<(String, String)>>,
    stall_connect: bool,
}

impl FakeBackends {
    pub fn with_clients(clients: Vec<FakeToolClient>) -> Self {
        Self {
            clients: clients.into_iter().map(Arc::new).collect(),
            azure_requests: Mutex::new(Vec::new()),
            stall_connect: false,
        }
    }

    /// Make `azure_client` and `github_client` never connect
    pub fn stalled_connect(mut self) -> Self {
        self.stall_connect = true;
        self
    }

    /// The client registered under `name`
    pub fn client(&self, name: &str) -> Option<Arc<FakeToolClient>> {
        self.clients.iter().find(|c| c.name == name).cloned()
    }

    /// `(subscription, tenant)` pairs passed to `azure_client`
    pub fn azure_requests(&self) -> Vec<(String, String)> {
        self.azure_requests.lock().unwrap().clone()
    }

    fn named(&self, name: &str) -> AppResult<Arc<dyn ToolClient>> {
        self.client(name)
            .map(|client| client as Arc<dyn ToolClient>)
            .ok_or_else(|| AppError::ToolTransport(format!("no {} backend", name)))
    }
}

#[async_trait]
impl ToolBackends for FakeBackends {
    async fn azure_client(
        &self,
        subscription_id: &str,
        tenant_id: &str,
        _cancel: &CancellationToken,
    ) -> AppResult<Arc<dyn ToolClient>> {
        self.azure_requests
            .lock()
            .unwrap()
            .push((subscription_id.to_string(), tenant_id.to_string()));
        if self.stall_connect {
            return std::future::pending().await;
        }
        self.named("azure")
    }

    async fn github_client(
        &self,
        _token: &str,
        _cancel: &CancellationToken,
    ) -> AppResult<Arc<dyn ToolClient>> {
        if self.stall_connect {
            return std::future::pending().await;
        }
        self.named("github")
    }

    async fn active_clients(&self) -> Vec<Arc<dyn ToolClient>> {
        self.clients
            .iter()
            .map(|client| client.clone() as Arc<dyn ToolClient>)
            .collect()
    }
}

// =============================================================================
// Reasoning
// =============================================================================

/// One recorded reasoning session run
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRun {
    pub session: String,
    pub instruction: String,
    pub user_input: String,
    /// Names of the tools offered
    pub tools: Vec<String>,
    /// Outputs of the tool calls the session made
    pub tool_outputs: Vec<String>,
}

#[derive(Default)]
struct Script {
    default_reply: Option<String>,
    session_replies: HashMap<String, Option<String>>,
    session_tool_calls: HashMap<String, Vec<String>>,
    failure: Option<AppError>,
}

/// Reasoning client returning canned replies
///
/// Sessions optionally call named tools (with empty arguments) before
/// replying, so tool routing can be observed end to end.
#[derive(Clone, Default)]
pub struct ScriptedReasoning {
    script: Arc<Mutex<Script>>,
    runs: Arc<Mutex<Vec<RecordedRun>>>,
}

impl ScriptedReasoning {
    /// Every session replies with `text`
    pub fn replying(text: Option<&str>) -> Self {
        let reasoning = Self::default();
        reasoning.script.lock().unwrap().default_reply = text.map(str::to_string);
        reasoning
    }

    /// The first run fails with `error`; later runs reply with nothing
    pub fn failing(error: AppError) -> Self {
        let reasoning = Self::default();
        reasoning.script.lock().unwrap().failure = Some(error);
        reasoning
    }

    /// Sessions named `session` reply with `text`
    pub fn with_session_reply(self, session: &str, text: Option<&str>) -> Self {
        self.script
            .lock()
            .unwrap()
            .session_replies
            .insert(session.to_string(), text.map(str::to_string));
        self
    }

    /// Sessions named `session` call `tool` before replying
    pub fn with_tool_call(self, session: &str, tool: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .session_tool_calls
            .entry(session.to_string())
            .or_default()
            .push(tool.to_string());
        self
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().unwrap().clone()
    }
}

impl ReasoningClient for ScriptedReasoning {
    fn create_session(&self, instruction: &str, name: &str) -> Box<dyn ReasoningSession> {
        Box::new(ScriptedSession {
            reasoning: self.clone(),
            instruction: instruction.to_string(),
            name: name.to_string(),
        })
    }
}

struct ScriptedSession {
    reasoning: ScriptedReasoning,
    instruction: String,
    name: String,
}

#[async_trait]
impl ReasoningSession for ScriptedSession {
    async fn run(
        &self,
        user_input: &str,
        tools: &[BoundTool],
        cancel: &CancellationToken,
    ) -> AppResult<Option<String>> {
        let (failure, reply, tool_calls) = {
            let mut script = self.reasoning.script.lock().unwrap();
            let reply = script
                .session_replies
                .get(&self.name)
                .cloned()
                .unwrap_or_else(|| script.default_reply.clone());
            let tool_calls = script
                .session_tool_calls
                .get(&self.name)
                .cloned()
                .unwrap_or_default();
            (script.failure.take(), reply, tool_calls)
        };

        let mut tool_outputs = Vec::new();
        for wanted in &tool_calls {
            if let Some(tool) = tools.iter().find(|t| t.name() == wanted) {
                tool_outputs.push(tool.invoke(ToolArgs::new(), cancel).await?);
            }
        }

        self.reasoning.runs.lock().unwrap().push(RecordedRun {
            session: self.name.clone(),
            instruction: self.instruction.clone(),
            user_input: user_input.to_string(),
            tools: tools.iter().map(|t| t.name().to_string()).collect(),
            tool_outputs,
        });

        match failure {
            Some(error) => Err(error),
            None => Ok(reply),
        }
    }
}

// =============================================================================
// Stages
// =============================================================================

/// Diagnosis stage returning a fixed report and recording its inputs
pub struct FakeDiagnosis {
    report: String,
    calls: Mutex<Vec<String>>,
}

impl FakeDiagnosis {
    pub fn new(report: &str) -> Self {
        Self {
            report: report.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosisStage for FakeDiagnosis {
    async fn investigate(&self, anomaly: &str, _cancel: &CancellationToken) -> String {
        self.calls.lock().unwrap().push(anomaly.to_string());
        self.report.clone()
    }
}

/// Remediation stage recording its inputs
pub struct FakeRemediation {
    outcome: Mutex<Option<AppError>>,
    summary: String,
    calls: Mutex<Vec<String>>,
}

impl FakeRemediation {
    pub fn succeeding(summary: &str) -> Self {
        Self {
            outcome: Mutex::new(None),
            summary: summary.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The first call fails with `error`
    pub fn failing(error: AppError) -> Self {
        Self {
            outcome: Mutex::new(Some(error)),
            summary: String::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemediationStage for FakeRemediation {
    async fn remediate(&self, report: &str, _cancel: &CancellationToken) -> AppResult<String> {
        self.calls.lock().unwrap().push(report.to_string());
        match self.outcome.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(self.summary.clone()),
        }
    }
}
