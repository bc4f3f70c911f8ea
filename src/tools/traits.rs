//! Core tool trait and result types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ToolArgs;
use crate::error::ToolError;
use crate::gateway::{FunctionDefinition, ToolDefinition};

/// A tool that can be called by the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description
    fn description(&self) -> &str;

    /// Get the JSON Schema for tool parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with normalized arguments.
    ///
    /// Required parameters listed in the schema have already been checked.
    async fn execute(&self, args: ToolArgs) -> Result<ToolResult, ToolError>;

    /// Convert to a function-calling tool definition
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters_schema(),
            },
        }
    }

    /// Parameter names listed under the schema's `required` array
    fn required_parameters(&self) -> Vec<String> {
        self.parameters_schema()
            .get("required")
            .and_then(|r| r.as_array())
            .map(|names| names.iter().filter_map(|n| n.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }
}

/// Result of a tool execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Result content (for successful execution)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Error message (for failed execution)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(output: impl Into<String>) -> Self {
        ToolResult {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    /// Create a successful result with metadata
    pub fn success_with_metadata(output: impl Into<String>, metadata: Value) -> Self {
        ToolResult {
            output: Some(output.into()),
            error: None,
            metadata: Some(metadata),
        }
    }

    /// Create a failed result
    pub fn failure(error: impl Into<String>) -> Self {
        ToolResult {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Text fed back to the model as the tool message content
    pub fn to_content(&self) -> String {
        match &self.error {
            Some(error) => format!("Error: {}", error),
            None => self.output.clone().unwrap_or_default(),
        }
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::failure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result() {
        let success = ToolResult::success("Done!");
        assert!(!success.is_error());
        assert_eq!(success.to_content(), "Done!");

        let failure = ToolResult::failure("Oops!");
        assert!(failure.is_error());
        assert_eq!(failure.to_content(), "Error: Oops!");
    }

    #[test]
    fn test_tool_error_converts_to_failure() {
        let result: ToolResult = ToolError::MissingParameter("city".into()).into();
        assert!(result.is_error());
        assert!(result.to_content().contains("city"));
    }
}
