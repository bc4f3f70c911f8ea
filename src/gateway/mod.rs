//! Language-model gateway
//!
//! - `client`: `LlmGateway`, the retrying entry point used by agents
//! - `transport`: the HTTP seam and its reqwest implementation
//! - `protocol`: message ordering checks and tool-call decoding
//! - `retry`: backoff schedule
//! - `monitor`: usage and cost accounting
//! - `types`: chat-completions wire format

pub mod client;
pub mod monitor;
pub mod protocol;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::LlmGateway;
pub use monitor::{UsageMonitor, UsageSnapshot};
pub use protocol::validate_message_order;
pub use retry::RetryPolicy;
pub use transport::{ChatTransport, HttpTransport};
pub use types::{
    FunctionDefinition, InvalidToolCall, ToolChoice, ToolDefinition, ToolResponse, Usage,
};
