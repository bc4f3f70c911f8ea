//! Configuration module
//!
//! - types/mod.rs: Core configuration types (Config, AgentConfig, FlowConfig, LogConfig)
//! - types/gateway.rs: Endpoint, sampling and retry settings
//! - types/memory.rs: Working-memory limits
//! - io.rs: Configuration loading
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

// Re-export core config types
pub use types::{AgentConfig, Config, DegradationPolicy, FlowConfig, LogConfig};

// Re-export gateway and memory types
pub use types::gateway::{GatewayConfig, RetryConfig, SamplingParams};
pub use types::memory::MemoryConfig;

// Re-export IO and utilities
pub use io::{apply_env_overrides, load_config, load_config_from_path};
pub use paths::{config_dir, config_path};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
