//! HTTP transport for chat completions
//!
//! `ChatTransport` is the seam between the gateway's retry/normalization
//! logic and the network. `HttpTransport` talks to any OpenAI-compatible
//! endpoint; tests substitute scripted transports.

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use super::types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::config::GatewayConfig;
use crate::error::{Error, GatewayError, Result};

/// One request/response exchange with a chat-completions endpoint
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a single request. No retries happen at this layer.
    async fn send(
        &self,
        request: &ChatCompletionRequest,
    ) -> std::result::Result<ChatCompletionResponse, GatewayError>;
}

/// reqwest-backed transport for OpenAI-compatible endpoints
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// Build a transport with bearer auth and the configured request timeout
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        let key = config.api_key.expose_secret();
        if !key.is_empty() {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", key))
                    .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(
        &self,
        request: &ChatCompletionRequest,
    ) -> std::result::Result<ChatCompletionResponse, GatewayError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<ChatCompletionResponse>()
                .await
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "Chat completion request failed");
        Err(classify_status(status.as_u16(), body))
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(err.to_string())
    } else if err.is_decode() {
        GatewayError::InvalidResponse(err.to_string())
    } else {
        GatewayError::Network(err.to_string())
    }
}

/// Map a non-success status and its body onto the gateway error taxonomy.
///
/// Server-side and rate-limit statuses stay retryable; other client errors
/// surface the provider's `error.message` when the body carries one.
pub(crate) fn classify_status(status: u16, body: String) -> GatewayError {
    match status {
        503 => GatewayError::ServiceUnavailable(body),
        429 | 500..=599 => GatewayError::Http { status, body },
        400..=499 => match api_error_message(&body) {
            Some(message) => GatewayError::Api(message),
            None => GatewayError::Http { status, body },
        },
        _ => GatewayError::Http { status, body },
    }
}

fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}
