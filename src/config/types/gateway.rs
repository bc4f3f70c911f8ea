//! Gateway configuration types
//!
//! Endpoint, sampling and retry settings for the language-model gateway.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

/// Language-model gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// API key
    #[serde(skip_serializing, default = "default_secret")]
    pub api_key: SecretString,
    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Sampling parameters
    #[serde(default)]
    pub sampling: SamplingParams,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// USD per 1K prompt tokens, used for cost estimates only
    #[serde(default = "default_prompt_price")]
    pub prompt_price_per_1k: f64,
    /// USD per 1K completion tokens, used for cost estimates only
    #[serde(default = "default_completion_price")]
    pub completion_price_per_1k: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            api_key: default_secret(),
            model: default_model(),
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            sampling: SamplingParams::default(),
            retry: RetryConfig::default(),
            prompt_price_per_1k: default_prompt_price(),
            completion_price_per_1k: default_completion_price(),
        }
    }
}

fn default_model() -> String {
    "deepseek/deepseek-chat".to_string()
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_prompt_price() -> f64 {
    0.0014
}

fn default_completion_price() -> f64 {
    0.0028
}

/// Sampling parameters forwarded to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Top-p sampling (0.0 - 1.0)
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Frequency penalty (-2.0 - 2.0)
    #[serde(default)]
    pub frequency_penalty: f32,
    /// Presence penalty (-2.0 - 2.0)
    #[serde(default)]
    pub presence_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        SamplingParams {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

impl SamplingParams {
    /// Deterministic output, for classification and decomposition
    pub fn precise() -> Self {
        SamplingParams {
            temperature: 0.0,
            ..Default::default()
        }
    }
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

/// Retry budget and backoff shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call (values below 1 are treated as 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(default = "default_base_delay")]
    pub base_delay_seconds: f64,
    /// Upper bound for any single delay
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: f64,
    /// Growth factor between consecutive delays
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: default_max_retries(),
            base_delay_seconds: default_base_delay(),
            max_delay_seconds: default_max_delay(),
            backoff_multiplier: default_multiplier(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    10.0
}

fn default_multiplier() -> f64 {
    2.0
}
