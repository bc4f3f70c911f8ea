//! Conversation types shared by the gateway, memory and agents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message providing context and instructions
    System,
    /// User message
    User,
    /// Assistant (AI) response
    Assistant,
    /// Tool/function result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A scalar tool argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ArgValue {
    /// Normalize an arbitrary JSON value; arrays, objects and null keep their JSON text
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => ArgValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => ArgValue::Number(f),
                None => ArgValue::Text(n.to_string()),
            },
            serde_json::Value::String(s) => ArgValue::Text(s.clone()),
            other => ArgValue::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ArgValue::Bool(b) => serde_json::Value::Bool(*b),
            ArgValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ArgValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            ArgValue::Text(s) => s.trim().parse().ok(),
            ArgValue::Bool(_) => None,
        }
    }
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Number(n) => write!(f, "{}", n),
            ArgValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Text(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Text(s)
    }
}

impl From<f64> for ArgValue {
    fn from(n: f64) -> Self {
        ArgValue::Number(n)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

/// Named tool arguments
pub type ToolArgs = BTreeMap<String, ArgValue>;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id echoed by the tool-result message
    pub id: String,
    /// Tool name
    pub tool_name: String,
    /// Normalized arguments
    pub arguments: ToolArgs,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: ToolArgs) -> Self {
        ToolCall {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Arguments rendered as a JSON object string, as the wire format expects
    pub fn arguments_json(&self) -> String {
        let object: serde_json::Map<String, serde_json::Value> = self
            .arguments
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(object).to_string()
    }
}

/// Optional protocol data attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageMetadata {
    /// Tool calls declared by an assistant message
    ToolCalls { calls: Vec<ToolCall> },
    /// Correlation of a tool message to the call it answers
    ToolResponse { tool_call_id: String, tool_name: String },
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id
    pub id: Uuid,
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Tool-call protocol data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Message {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create an assistant message that declares tool calls
    pub fn assistant_with_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let mut message = Self::with_role(Role::Assistant, content);
        if !calls.is_empty() {
            message.metadata = Some(MessageMetadata::ToolCalls { calls });
        }
        message
    }

    /// Create a new tool result message
    pub fn tool(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut message = Self::with_role(Role::Tool, content);
        message.metadata = Some(MessageMetadata::ToolResponse {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
        });
        message
    }

    /// Override the creation time
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Tool calls declared by this message, empty unless it is an assistant turn
    pub fn tool_calls(&self) -> &[ToolCall] {
        match &self.metadata {
            Some(MessageMetadata::ToolCalls { calls }) => calls,
            _ => &[],
        }
    }

    /// The call id this message answers, for tool messages
    pub fn tool_call_id(&self) -> Option<&str> {
        match &self.metadata {
            Some(MessageMetadata::ToolResponse { tool_call_id, .. }) => Some(tool_call_id),
            _ => None,
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}
