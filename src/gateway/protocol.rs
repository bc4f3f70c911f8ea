//! Conversion between conversation messages and the wire format
//!
//! Outbound: ordering validation and `Message` → `WireMessage`.
//! Inbound: per-call decoding of tool calls into `ToolCall`.

use std::collections::HashSet;

use super::types::{FunctionCall, InvalidToolCall, WireMessage, WireToolCall};
use crate::core::{ArgValue, Message, Role, ToolArgs, ToolCall};
use crate::error::GatewayError;

/// Check that every tool message answers a call declared by the assistant
/// turn it follows.
///
/// A tool message may be preceded by sibling tool messages answering the same
/// turn. Any other message in between breaks the chain.
pub fn validate_message_order(messages: &[Message]) -> Result<(), GatewayError> {
    let mut open_calls: Option<HashSet<&str>> = None;

    for (index, message) in messages.iter().enumerate() {
        match message.role {
            Role::Tool => {
                let call_id = message.tool_call_id().ok_or_else(|| {
                    GatewayError::ProtocolViolation(format!(
                        "tool message at position {} has no tool_call_id",
                        index
                    ))
                })?;
                let answered = open_calls
                    .as_mut()
                    .map(|open| open.remove(call_id))
                    .unwrap_or(false);
                if !answered {
                    return Err(GatewayError::ProtocolViolation(format!(
                        "tool message at position {} answers '{}' which the preceding \
                         assistant turn did not declare",
                        index, call_id
                    )));
                }
            }
            Role::Assistant if !message.tool_calls().is_empty() => {
                open_calls = Some(message.tool_calls().iter().map(|c| c.id.as_str()).collect());
            }
            _ => open_calls = None,
        }
    }

    Ok(())
}

/// Convert a conversation message into its wire shape
pub fn to_wire(message: &Message) -> WireMessage {
    let mut wire = WireMessage {
        role: message.role,
        content: Some(message.content.clone()),
        name: None,
        tool_call_id: None,
        tool_calls: None,
    };

    match message.role {
        Role::Assistant if !message.tool_calls().is_empty() => {
            wire.tool_calls = Some(message.tool_calls().iter().map(WireToolCall::from).collect());
            if message.content.is_empty() {
                wire.content = None;
            }
        }
        Role::Tool => {
            if let Some(crate::core::MessageMetadata::ToolResponse {
                tool_call_id,
                tool_name,
            }) = &message.metadata
            {
                wire.tool_call_id = Some(tool_call_id.clone());
                wire.name = Some(tool_name.clone());
            }
        }
        _ => {}
    }

    wire
}

/// Decode raw tool calls one by one, keeping the ones that decode
pub fn decode_tool_calls(raw: &[serde_json::Value]) -> (Vec<ToolCall>, Vec<InvalidToolCall>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();

    for value in raw {
        match decode_tool_call(value) {
            Ok(call) => valid.push(call),
            Err(bad) => invalid.push(bad),
        }
    }

    (valid, invalid)
}

fn decode_tool_call(value: &serde_json::Value) -> Result<ToolCall, InvalidToolCall> {
    let id = value.get("id").and_then(|v| v.as_str()).map(str::to_string);
    let name = value
        .get("function")
        .and_then(|f| f.get("name"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let invalid = |reason: String| InvalidToolCall {
        id: id.clone(),
        name: name.clone(),
        reason,
    };

    let wire: WireToolCall = serde_json::from_value(value.clone())
        .map_err(|e| invalid(format!("malformed tool call: {}", e)))?;

    if wire.id.trim().is_empty() {
        return Err(invalid("tool call has an empty id".to_string()));
    }
    if wire.function.name.trim().is_empty() {
        return Err(invalid("tool call has an empty function name".to_string()));
    }

    let arguments = parse_arguments(&wire.function).map_err(invalid)?;
    Ok(ToolCall::new(wire.id, wire.function.name, arguments))
}

/// Normalize a JSON argument string into scalar tool arguments.
///
/// An empty string is treated as no arguments.
fn parse_arguments(function: &FunctionCall) -> Result<ToolArgs, String> {
    let text = function.arguments.trim();
    if text.is_empty() {
        return Ok(ToolArgs::new());
    }

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| format!("arguments for '{}' are not valid JSON: {}", function.name, e))?;

    match value {
        serde_json::Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), ArgValue::from_json(v)))
            .collect()),
        serde_json::Value::Null => Ok(ToolArgs::new()),
        other => Err(format!(
            "arguments for '{}' must be a JSON object, got {}",
            function.name, other
        )),
    }
}
