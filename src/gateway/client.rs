//! Language-model gateway
//!
//! Builds one request per call, retries transient failures with jittered
//! exponential backoff, normalizes tool calls and reports every attempt to
//! the shared usage monitor.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::monitor::UsageMonitor;
use super::protocol::{decode_tool_calls, to_wire, validate_message_order};
use super::retry::RetryPolicy;
use super::transport::{ChatTransport, HttpTransport};
use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, ResponseMessage, ToolChoice, ToolDefinition,
    ToolResponse,
};
use crate::config::{GatewayConfig, SamplingParams};
use crate::core::Message;
use crate::error::{GatewayError, Result};

/// Gateway to an OpenAI-compatible chat-completions endpoint
#[derive(Clone)]
pub struct LlmGateway {
    transport: Arc<dyn ChatTransport>,
    model: String,
    sampling: SamplingParams,
    retry: RetryPolicy,
    monitor: Arc<UsageMonitor>,
}

impl std::fmt::Debug for LlmGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmGateway")
            .field("model", &self.model)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl LlmGateway {
    /// Create a gateway backed by the reqwest transport
    pub fn new(config: &GatewayConfig, monitor: Arc<UsageMonitor>) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        info!(model = %config.model, endpoint = %transport.endpoint(), "LLM gateway initialized");
        Ok(Self::with_transport(Arc::new(transport), config, monitor))
    }

    /// Create a gateway over any transport
    pub fn with_transport(
        transport: Arc<dyn ChatTransport>,
        config: &GatewayConfig,
        monitor: Arc<UsageMonitor>,
    ) -> Self {
        LlmGateway {
            transport,
            model: config.model.clone(),
            sampling: config.sampling.clone(),
            retry: RetryPolicy::new(&config.retry),
            monitor,
        }
    }

    /// Same transport and monitor, different sampling parameters
    pub fn with_sampling(&self, sampling: SamplingParams) -> Self {
        LlmGateway {
            sampling,
            ..self.clone()
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn monitor(&self) -> &Arc<UsageMonitor> {
        &self.monitor
    }

    /// Plain completion; returns the assistant text
    pub async fn chat(&self, messages: &[Message]) -> std::result::Result<String, GatewayError> {
        let request = self.build_request(messages, &[], None)?;
        let response = self.send_with_retry(&request).await?;
        let message = first_message(response)?;
        Ok(message.content.unwrap_or_default())
    }

    /// Completion with tools offered to the model
    pub async fn ask_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        tool_choice: ToolChoice,
    ) -> std::result::Result<ToolResponse, GatewayError> {
        let request = self.build_request(messages, tools, Some(tool_choice))?;
        let response = self.send_with_retry(&request).await?;
        let usage = response.usage;
        let message = first_message(response)?;

        let raw_calls = message.tool_calls.unwrap_or_default();
        let (tool_calls, invalid_tool_calls) = decode_tool_calls(&raw_calls);

        if !raw_calls.is_empty() && tool_calls.is_empty() {
            let reasons: Vec<&str> = invalid_tool_calls.iter().map(|c| c.reason.as_str()).collect();
            return Err(GatewayError::InvalidToolCall(reasons.join("; ")));
        }
        for bad in &invalid_tool_calls {
            warn!(
                id = bad.id.as_deref().unwrap_or("?"),
                tool = bad.name.as_deref().unwrap_or("?"),
                reason = %bad.reason,
                "Dropping undecodable tool call"
            );
        }

        Ok(ToolResponse {
            text: message.content.filter(|t| !t.is_empty()),
            tool_calls,
            invalid_tool_calls,
            usage,
        })
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
    ) -> std::result::Result<ChatCompletionRequest, GatewayError> {
        validate_message_order(messages)?;

        let (tools, tool_choice) = if tools.is_empty() {
            (None, None)
        } else {
            (Some(tools.to_vec()), tool_choice.map(|c| c.to_wire()))
        };

        Ok(ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.iter().map(to_wire).collect(),
            tools,
            tool_choice,
            max_tokens: self.sampling.max_tokens,
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
            frequency_penalty: self.sampling.frequency_penalty,
            presence_penalty: self.sampling.presence_penalty,
        })
    }

    async fn send_with_retry(
        &self,
        request: &ChatCompletionRequest,
    ) -> std::result::Result<ChatCompletionResponse, GatewayError> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let started = Instant::now();

            match self.transport.send(request).await {
                Ok(response) => {
                    let latency = started.elapsed();
                    self.monitor.record_success(response.usage.as_ref(), latency);
                    debug!(
                        attempt,
                        latency_ms = latency.as_millis() as u64,
                        tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0),
                        "Chat completion succeeded"
                    );
                    return Ok(response);
                }
                Err(err) => {
                    self.monitor.record_failure(started.elapsed());

                    if !err.is_retryable() {
                        warn!(attempt, error = %err, "Chat completion failed (not retryable)");
                        return Err(err);
                    }
                    if attempt >= max_attempts {
                        warn!(
                            attempts = attempt,
                            error = %err,
                            "Chat completion retries exhausted"
                        );
                        return Err(GatewayError::RetriesExhausted {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }

                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Chat completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn first_message(
    response: ChatCompletionResponse,
) -> std::result::Result<ResponseMessage, GatewayError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| GatewayError::InvalidResponse("response contained no choices".to_string()))
}
