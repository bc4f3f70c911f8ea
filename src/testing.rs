//! Test doubles shared by unit tests across the crate

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::config::{GatewayConfig, RetryConfig};
use crate::core::ToolArgs;
use crate::error::{GatewayError, ToolError};
use crate::gateway::types::{ChatCompletionRequest, ChatCompletionResponse, Choice, ResponseMessage};
use crate::gateway::{ChatTransport, LlmGateway, UsageMonitor, Usage};
use crate::tools::{Tool, ToolResult};

pub(crate) type Reply = Result<ChatCompletionResponse, GatewayError>;

/// A plain assistant text response
pub(crate) fn text_reply(text: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: "cmpl-test".to_string(),
        model: "test-model".to_string(),
        choices: vec![Choice {
            message: ResponseMessage {
                content: Some(text.to_string()),
                tool_calls: None,
            },
            finish_reason: Some("stop".to_string()),
        }],
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

/// An assistant response requesting tool calls given as `(id, name, arguments)`
pub(crate) fn tool_reply(text: &str, calls: &[(&str, &str, Value)]) -> ChatCompletionResponse {
    let mut reply = text_reply(text);
    let raw = calls
        .iter()
        .map(|(id, name, args)| {
            json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": args.to_string()}
            })
        })
        .collect();
    reply.choices[0].message.tool_calls = Some(raw);
    reply.choices[0].finish_reason = Some("tool_calls".to_string());
    reply
}

/// Content of the first (system) message of a request
pub(crate) fn system_prompt(request: &ChatCompletionRequest) -> &str {
    request
        .messages
        .first()
        .and_then(|m| m.content.as_deref())
        .unwrap_or("")
}

/// Content of the last user message of a request
pub(crate) fn last_user_content(request: &ChatCompletionRequest) -> &str {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == crate::core::Role::User)
        .and_then(|m| m.content.as_deref())
        .unwrap_or("")
}

/// Transport that replays a fixed script of replies and records requests
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        ScriptedTransport {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send(&self, request: &ChatCompletionRequest) -> Reply {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Api("script exhausted".to_string())))
    }
}

type Handler = dyn Fn(&ChatCompletionRequest) -> Reply + Send + Sync;

/// Transport that answers each request through a closure
pub(crate) struct FnTransport {
    handler: Box<Handler>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl FnTransport {
    pub(crate) fn new(
        handler: impl Fn(&ChatCompletionRequest) -> Reply + Send + Sync + 'static,
    ) -> Self {
        FnTransport {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatTransport for FnTransport {
    async fn send(&self, request: &ChatCompletionRequest) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        tokio::task::yield_now().await;
        (self.handler)(request)
    }
}

/// Gateway over `transport` with a single attempt and no backoff
pub(crate) fn gateway_over(transport: Arc<dyn ChatTransport>) -> Arc<LlmGateway> {
    let config = GatewayConfig {
        retry: RetryConfig {
            max_retries: 1,
            base_delay_seconds: 0.0,
            max_delay_seconds: 0.0,
            backoff_multiplier: 1.0,
        },
        ..GatewayConfig::default()
    };
    Arc::new(LlmGateway::with_transport(transport, &config, Arc::new(UsageMonitor::default())))
}

type ToolFn = dyn Fn(&ToolArgs) -> Result<ToolResult, ToolError> + Send + Sync;

/// Configurable tool double that counts its executions
pub(crate) struct MockTool {
    name: String,
    description: String,
    required: Vec<String>,
    behavior: Box<ToolFn>,
    calls: Arc<AtomicUsize>,
}

impl MockTool {
    pub(crate) fn new(
        name: &str,
        description: &str,
        required: &[&str],
        behavior: impl Fn(&ToolArgs) -> Result<ToolResult, ToolError> + Send + Sync + 'static,
    ) -> Self {
        MockTool {
            name: name.to_string(),
            description: description.to_string(),
            required: required.iter().map(|s| s.to_string()).collect(),
            behavior: Box::new(behavior),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_output(
        name: &str,
        description: &str,
        required: &[&str],
        output: &str,
    ) -> Self {
        let output = output.to_string();
        Self::new(name, description, required, move |_| Ok(ToolResult::success(output.clone())))
    }

    pub(crate) fn failing(name: &str, description: &str, error: &str) -> Self {
        let error = error.to_string();
        Self::new(name, description, &[], move |_| Err(ToolError::ExecutionFailed(error.clone())))
    }

    pub(crate) fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .required
            .iter()
            .map(|p| (p.clone(), json!({"type": "string"})))
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.behavior)(&args)
    }
}
