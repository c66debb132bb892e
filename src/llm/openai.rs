//! OpenAI-compatible reasoning client
//!
//! Runs a chat completions tool loop: the model is offered every bound tool
//! as a function, requested calls are executed and answered, and the loop
//! ends when the model replies with text or the round limit is reached.

use std::collections::HashSet;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::Config,
    error::{AppError, AppResult},
    mcp::{types::args_from_json, BoundTool},
};

use super::session::{ReasoningClient, ReasoningSession};
use super::types::{
    sanitize_tool_name, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ToolCall,
    ToolDefinition, MAX_TOOL_NAME_LEN,
};

/// Connection settings shared by every session of a client
struct Endpoint {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tool_rounds: usize,
}

/// Reasoning client backed by an OpenAI-compatible chat completions API
pub struct OpenAiChatClient {
    endpoint: Arc<Endpoint>,
}

impl OpenAiChatClient {
    /// Create a client from configuration
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self::with_endpoint(
            client,
            config.llm_api_url.clone(),
            config.llm_api_key.clone(),
            config.llm_model.clone(),
            config.llm_max_tool_rounds,
        )
    }

    /// Create a client for an explicit endpoint
    pub fn with_endpoint(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        max_tool_rounds: usize,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            endpoint: Arc::new(Endpoint {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
                model: model.into(),
                max_tool_rounds,
            }),
        }
    }

    /// Check if the client is configured with an API key
    pub fn is_configured(&self) -> bool {
        self.endpoint.api_key.is_some()
    }
}

impl ReasoningClient for OpenAiChatClient {
    fn create_session(&self, instruction: &str, name: &str) -> Box<dyn ReasoningSession> {
        Box::new(OpenAiChatSession {
            endpoint: self.endpoint.clone(),
            instruction: instruction.to_string(),
            name: name.to_string(),
        })
    }
}

/// One chat completions session with a fixed system instruction
pub struct OpenAiChatSession {
    endpoint: Arc<Endpoint>,
    instruction: String,
    name: String,
}

#[async_trait::async_trait]
impl ReasoningSession for OpenAiChatSession {
    #[instrument(skip(self, user_input, tools, cancel), fields(session = %self.name, tools = tools.len()))]
    async fn run(
        &self,
        user_input: &str,
        tools: &[BoundTool],
        cancel: &CancellationToken,
    ) -> AppResult<Option<String>> {
        let api_key = self
            .endpoint
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("LLM_API_KEY is not set".to_string()))?;
        let headers = default_headers(api_key)?;

        let names = function_names(tools);
        let definitions: Vec<ToolDefinition> = tools
            .iter()
            .zip(&names)
            .map(|(tool, name)| ToolDefinition::from_descriptor(name.clone(), &tool.descriptor))
            .collect();

        let mut messages = vec![
            ChatMessage::system(&self.instruction),
            ChatMessage::user(user_input),
        ];

        let max_rounds = self.endpoint.max_tool_rounds;
        for round in 0..max_rounds {
            let message = self.complete(&headers, &messages, &definitions, cancel).await?;

            let calls = message.requested_tool_calls().to_vec();
            if calls.is_empty() || definitions.is_empty() {
                info!(round, "Reasoning session finished");
                return Ok(final_text(message));
            }

            debug!(round, calls = calls.len(), "Model requested tool calls");
            messages.push(message);
            for call in &calls {
                let answer = execute_call(call, tools, &names, cancel).await?;
                messages.push(ChatMessage::tool(&call.id, answer));
            }
        }

        // Out of tool rounds: one last request without tools.
        let message = self.complete(&headers, &messages, &[], cancel).await?;
        info!(rounds = max_rounds, "Reasoning session finished after exhausting tool rounds");
        Ok(final_text(message))
    }
}

/// Non-blank assistant text, if any
fn final_text(message: ChatMessage) -> Option<String> {
    message.content.filter(|text| !text.trim().is_empty())
}

impl OpenAiChatSession {
    /// One completion request, raced against `cancel`
    async fn complete(
        &self,
        headers: &HeaderMap,
        messages: &[ChatMessage],
        offered: &[ToolDefinition],
        cancel: &CancellationToken,
    ) -> AppResult<ChatMessage> {
        let request = ChatCompletionRequest {
            model: &self.endpoint.model,
            messages,
            tools: offered,
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            response = self.post(headers, &request) => response?,
        };

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| AppError::UpstreamError("Response contained no choices".to_string()))
    }

    async fn post(
        &self,
        headers: &HeaderMap,
        request: &ChatCompletionRequest<'_>,
    ) -> AppResult<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.endpoint.base_url);
        let response = self
            .endpoint
            .client
            .post(&url)
            .headers(headers.clone())
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamError(format!(
                "Chat completions error {}: {}",
                status, text
            )));
        }

        Ok(response.json().await?)
    }
}

/// Run one requested tool call and render the answer for the model
///
/// Only cancellation aborts the session. Every other failure is reported
/// back to the model as text.
async fn execute_call(
    call: &ToolCall,
    tools: &[BoundTool],
    names: &[String],
    cancel: &CancellationToken,
) -> AppResult<String> {
    let Some(tool) = names
        .iter()
        .position(|name| *name == call.function.name)
        .map(|index| &tools[index])
    else {
        warn!(tool = %call.function.name, "Model called an unknown tool");
        return Ok(format!("Error: unknown tool '{}'", call.function.name));
    };

    let raw = call.function.arguments.trim();
    let arguments = if raw.is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => return Ok(format!("Error: invalid arguments: {}", e)),
        }
    };

    match tool.invoke(args_from_json(arguments), cancel).await {
        Ok(output) => Ok(output),
        Err(AppError::Cancelled) => Err(AppError::Cancelled),
        Err(e) => {
            warn!(tool = %tool.name(), error = %e, "Tool call failed");
            Ok(format!("Error: {}", e))
        }
    }
}

/// Function names for `tools`, sanitized and made unique
///
/// Later duplicates get a numeric suffix (`search`, `search_2`, ...).
pub fn function_names(tools: &[BoundTool]) -> Vec<String> {
    let mut taken = HashSet::new();
    tools
        .iter()
        .map(|tool| {
            let base = sanitize_tool_name(tool.name());
            let mut candidate = base.clone();
            let mut n = 2;
            while !taken.insert(candidate.clone()) {
                let suffix = format!("_{}", n);
                let mut stem = base.clone();
                stem.truncate(MAX_TOOL_NAME_LEN - suffix.len());
                candidate = format!("{}{}", stem, suffix);
                n += 1;
            }
            candidate
        })
        .collect()
}

fn default_headers(api_key: &str) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|_| AppError::NotConfigured("LLM_API_KEY contains invalid characters".to_string()))?;
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}
