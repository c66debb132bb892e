//! Core types exchanged with tool servers
//!
//! Defines content blocks, tool call results, tool descriptors and the
//! argument values passed to tools.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single block of tool output
///
/// Only text blocks carry plain text. Every other block kind (images,
/// embedded resources, audio) is kept as its raw JSON rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Plain text content
    Text(String),
    /// Any non-text block, kept verbatim
    Other(serde_json::Value),
}

impl ContentBlock {
    /// Render the block as text
    ///
    /// Text blocks yield their text, other blocks their compact JSON.
    pub fn render(&self) -> String {
        match self {
            ContentBlock::Text(text) => text.clone(),
            ContentBlock::Other(value) => {
                serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
            }
        }
    }
}

impl Serialize for ContentBlock {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ContentBlock::Text(text) => {
                serde_json::json!({ "type": "text", "text": text }).serialize(serializer)
            }
            ContentBlock::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let text = match value.get("type").and_then(|t| t.as_str()) {
            Some("text") => value.get("text").and_then(|t| t.as_str()).map(str::to_string),
            _ => None,
        };
        match text {
            Some(text) => Ok(ContentBlock::Text(text)),
            None => Ok(ContentBlock::Other(value)),
        }
    }
}

/// Join the rendering of every block with newlines
pub fn flatten_content(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .map(ContentBlock::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result of one tool invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Ordered output blocks
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Set when the tool itself reported a failure
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl CallToolResult {
    /// Build a result holding a single text block
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text(text.into())],
            is_error: false,
        }
    }

    /// Flattened evidence text of this result
    pub fn flatten(&self) -> String {
        flatten_content(&self.content)
    }
}

/// Description of a tool offered by a tool server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Tool name, unique within its server
    pub name: String,
    /// Human description
    #[serde(default)]
    pub description: Option<String>,
    /// JSON Schema of the tool's arguments
    #[serde(default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

/// Schema accepting an object with no declared properties
pub fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// A single argument value passed to a tool
///
/// Closed set of shapes so arguments never need reflection. Lists and null
/// are carried so that arguments produced by a reasoning session survive
/// the conversion unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<ArgValue>),
    Map(ToolArgs),
}

/// Keyed tool arguments
pub type ToolArgs = BTreeMap<String, ArgValue>;

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::String(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Number(value.into())
    }
}

impl From<ToolArgs> for ArgValue {
    fn from(value: ToolArgs) -> Self {
        ArgValue::Map(value)
    }
}

impl From<serde_json::Value> for ArgValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ArgValue::Null,
            serde_json::Value::Bool(b) => ArgValue::Bool(b),
            serde_json::Value::Number(n) => ArgValue::Number(n),
            serde_json::Value::String(s) => ArgValue::String(s),
            serde_json::Value::Array(items) => {
                ArgValue::List(items.into_iter().map(ArgValue::from).collect())
            }
            serde_json::Value::Object(map) => ArgValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, ArgValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Convert a JSON object into tool arguments
///
/// Anything other than an object yields empty arguments.
pub fn args_from_json(value: serde_json::Value) -> ToolArgs {
    match ArgValue::from(value) {
        ArgValue::Map(args) => args,
        _ => ToolArgs::new(),
    }
}
