//! Built-in `terminate` tool. Calling it ends the agent's think-act loop.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::traits::{Tool, ToolResult};
use crate::core::ToolArgs;
use crate::error::ToolError;

/// Name the agent loop treats as its stop signal
pub const TERMINATE_TOOL_NAME: &str = "terminate";

/// Signals that the task is complete
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        TERMINATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Call this when the task is complete or cannot make further progress. \
         Optionally give a short reason."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reason": {
                    "type": "string",
                    "description": "Why the run is ending"
                }
            }
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let reason = args.get("reason").map(|v| v.to_string()).filter(|r| !r.trim().is_empty());
        Ok(match reason {
            Some(reason) => ToolResult::success(format!("Terminated: {}", reason)),
            None => ToolResult::success("Terminated"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_echoes_reason() {
        let mut args = ToolArgs::new();
        args.insert("reason".into(), "plan complete".into());
        let result = TerminateTool.execute(args).await.unwrap();
        assert_eq!(result.output.as_deref(), Some("Terminated: plan complete"));

        let bare = TerminateTool.execute(ToolArgs::new()).await.unwrap();
        assert_eq!(bare.output.as_deref(), Some("Terminated"));
        assert!(TerminateTool.required_parameters().is_empty());
    }
}
