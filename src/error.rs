//! Error types for TripAgent
//!
//! Each layer owns a narrow error enum so callers can match on the failure
//! modes that matter to them. `Error` aggregates all of them for code that
//! only needs to report.

use thiserror::Error;

/// Result type alias using TripAgent's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for TripAgent
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Language-model gateway error
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Agent execution error
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Planning flow error
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// Tool error
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures raised by the language-model gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Connection or request-level transport failure
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint did not answer within the request timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// HTTP 503 from the endpoint
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The endpoint reported an error in its payload
    #[error("API error: {0}")]
    Api(String),

    /// The response body could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A tool call in the response could not be decoded
    #[error("invalid tool call: {0}")]
    InvalidToolCall(String),

    /// The outbound message sequence breaks the tool-call ordering rules
    #[error("message protocol violation: {0}")]
    ProtocolViolation(String),

    /// Every attempt in the retry budget failed
    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<GatewayError>,
    },
}

impl GatewayError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_)
            | GatewayError::Timeout(_)
            | GatewayError::ServiceUnavailable(_) => true,
            GatewayError::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// The innermost cause, looking through `RetriesExhausted`
    pub fn root_cause(&self) -> &GatewayError {
        match self {
            GatewayError::RetriesExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Failures raised by a tool-calling agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// `run` was called while the agent was already working
    #[error("agent '{0}' is already executing a request")]
    ConcurrentExecution(String),

    /// A gateway call failed terminally during the loop
    #[error("execution failed: {0}")]
    ExecutionFailed(#[from] GatewayError),

    /// The think-act loop did not terminate within its step budget
    #[error("max steps exceeded ({0})")]
    MaxStepsExceeded(u32),

    /// The request cannot be executed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The run observed a cancelled token
    #[error("execution cancelled")]
    Cancelled,
}

/// Failures raised by the planning flow
#[derive(Error, Debug)]
pub enum FlowError {
    /// No worker is registered under the task's assigned id
    #[error("worker not found: {0}")]
    WorkerNotFound(String),

    /// A non-recoverable task failure (decomposition or synthesis)
    #[error("task execution failed: {0}")]
    TaskExecutionFailed(String),

    /// A worker lacks the capability its task requires
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A dependent-phase task failed
    #[error("execution timeout: {0}")]
    ExecutionTimeout(String),

    /// The flow was cancelled
    #[error("flow cancelled")]
    Cancelled,

    /// `execute` was called while a run was in progress
    #[error("flow is already running")]
    AlreadyRunning,
}

/// Failures raised by tools and the registry's argument checks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// A parameter the schema marks as required is absent
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// The tool ran but could not complete
    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),
}
