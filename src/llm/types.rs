//! Chat completions wire types
//!
//! Request and response shapes of the OpenAI-compatible `/chat/completions`
//! endpoint, plus the rules for turning tool descriptors into function
//! definitions the endpoint accepts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mcp::types::{empty_object_schema, ToolDescriptor};

/// Role of a message participant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    /// Text content; absent on assistant turns that only call tools
    #[serde(default)]
    pub content: Option<String>,
    /// Tool call ID this message answers (tool messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls requested by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Answer to one tool call
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Tool calls carried by this message, if any
    pub fn requested_tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

// =============================================================================
// Tool Calling Types
// =============================================================================

/// Longest function name the endpoint accepts
pub const MAX_TOOL_NAME_LEN: usize = 64;

static INVALID_NAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_-]").unwrap());

/// Rewrite a tool name into the `[a-zA-Z0-9_-]{1,64}` function-name alphabet
pub fn sanitize_tool_name(name: &str) -> String {
    let mut sanitized = INVALID_NAME_CHARS.replace_all(name, "_").into_owned();
    sanitized.truncate(MAX_TOOL_NAME_LEN);
    if sanitized.is_empty() {
        sanitized.push_str("tool");
    }
    sanitized
}

/// Validate a JSON Schema for function parameters
///
/// The schema must declare `type: "object"` and compile as draft 2020-12.
pub fn validate_tool_schema(schema: &serde_json::Value) -> Result<(), String> {
    match schema.get("type") {
        Some(serde_json::Value::String(t)) if t == "object" => {}
        Some(serde_json::Value::String(t)) => {
            return Err(format!(
                "Tool parameters schema must have type 'object', got '{}'",
                t
            ));
        }
        Some(_) => {
            return Err("Tool parameters schema 'type' must be a string".to_string());
        }
        None => {
            return Err("Tool parameters schema must have 'type' field".to_string());
        }
    }

    jsonschema::draft202012::new(schema).map_err(|e| format!("Invalid JSON Schema: {}", e))?;

    Ok(())
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Tool definition advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    /// Advertise `descriptor` under `name`
    ///
    /// A schema that fails validation is replaced by an empty object schema
    /// so one malformed tool does not make the whole request invalid.
    pub fn from_descriptor(name: String, descriptor: &ToolDescriptor) -> Self {
        let parameters = match validate_tool_schema(&descriptor.input_schema) {
            Ok(()) => descriptor.input_schema.clone(),
            Err(reason) => {
                tracing::warn!(tool = %descriptor.name, reason = %reason, "Replacing invalid tool schema");
                empty_object_schema()
            }
        };

        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name,
                description: descriptor.description.clone().unwrap_or_default(),
                parameters,
            },
        }
    }
}

/// Function call details within a tool call
///
/// `arguments` is the JSON-encoded argument object as sent by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// A tool call from the assistant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

fn function_type() -> String {
    "function".to_string()
}

/// Body of a chat completions request
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "no_tools")]
    pub tools: &'a [ToolDefinition],
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

/// Body of a chat completions response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}
