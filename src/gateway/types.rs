//! Wire types for the OpenAI-compatible chat-completions endpoint
//!
//! Nothing outside the gateway sees these; agents and tools work with
//! `core::Message` and `core::ToolCall`.

use serde::{Deserialize, Serialize};

use crate::core::{Role, ToolCall};

/// A message as sent on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message (null for tool-call-only assistant turns)
    pub content: Option<String>,
    /// Tool name (for tool messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool call ID (for tool messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls made by assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

/// Tool call as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireToolCall {
    /// Unique ID for this tool call
    pub id: String,
    /// Type of tool call (usually "function")
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    /// Function details
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        WireToolCall {
            id: call.id.clone(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: call.tool_name.clone(),
                arguments: call.arguments_json(),
            },
        }
    }
}

/// Function call details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function to call
    pub name: String,
    /// Arguments as JSON string
    pub arguments: String,
}

/// Request to the chat-completions endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<WireMessage>,
    /// Available tools/functions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool choice strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<WireToolChoice>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Top-p sampling
    pub top_p: f32,
    /// Frequency penalty
    pub frequency_penalty: f32,
    /// Presence penalty
    pub presence_penalty: f32,
}

/// Tool definition for function calling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (usually "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function definition
    pub function: FunctionDefinition,
}

/// Function definition for tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for function parameters
    pub parameters: serde_json::Value,
}

/// How the model may use the offered tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// Let the model decide
    Auto,
    /// Never use tools
    None,
    /// Must call at least one tool
    Required,
    /// Force a specific tool
    Function(String),
}

impl ToolChoice {
    pub(crate) fn to_wire(&self) -> WireToolChoice {
        match self {
            ToolChoice::Auto => WireToolChoice::Mode("auto".to_string()),
            ToolChoice::None => WireToolChoice::Mode("none".to_string()),
            ToolChoice::Required => WireToolChoice::Mode("required".to_string()),
            ToolChoice::Function(name) => WireToolChoice::Specific {
                tool_type: "function".to_string(),
                function: FunctionName { name: name.clone() },
            },
        }
    }
}

/// Tool choice strategy as serialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireToolChoice {
    /// "auto" | "none" | "required"
    Mode(String),
    /// Force a specific tool
    Specific {
        #[serde(rename = "type")]
        tool_type: String,
        function: FunctionName,
    },
}

/// Function name for specific tool choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionName {
    /// Name of the function to call
    pub name: String,
}

/// Response from the chat-completions endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique ID for this completion
    #[serde(default)]
    pub id: String,
    /// Model used
    #[serde(default)]
    pub model: String,
    /// Completion choices
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Usage statistics
    pub usage: Option<Usage>,
}

/// A completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// The generated message
    pub message: ResponseMessage,
    /// Reason for stopping
    pub finish_reason: Option<String>,
}

/// Assistant message in a response.
///
/// Tool calls stay as raw JSON so each one can be decoded independently.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Raw tool calls
    #[serde(default)]
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    /// Sum token usage from one response into an accumulator
    pub fn accumulate(&mut self, delta: &Usage) {
        self.prompt_tokens += delta.prompt_tokens;
        self.completion_tokens += delta.completion_tokens;
        self.total_tokens += delta.total_tokens;
    }
}

/// A tool call that could not be decoded
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidToolCall {
    /// Call id when one could be read
    pub id: Option<String>,
    /// Function name when one could be read
    pub name: Option<String>,
    /// Why decoding failed
    pub reason: String,
}

/// Normalized result of a tool-enabled call
#[derive(Debug, Clone, Default)]
pub struct ToolResponse {
    /// Assistant text, if any
    pub text: Option<String>,
    /// Successfully decoded tool calls, in response order
    pub tool_calls: Vec<ToolCall>,
    /// Tool calls that failed to decode
    pub invalid_tool_calls: Vec<InvalidToolCall>,
    /// Token usage for this call
    pub usage: Option<Usage>,
}

impl ToolResponse {
    /// Assistant text, empty when absent
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
