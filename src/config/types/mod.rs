//! Configuration types module

pub mod gateway;
pub mod memory;

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Language-model gateway
    #[serde(default)]
    pub gateway: gateway::GatewayConfig,

    /// Tool-calling agent defaults
    #[serde(default)]
    pub agent: AgentConfig,

    /// Working memory limits
    #[serde(default)]
    pub memory: memory::MemoryConfig,

    /// Planning flow and routing behavior
    #[serde(default)]
    pub flow: FlowConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from files and environment variables
    ///
    /// Precedence: defaults < config file (if present) < environment.
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config()
    }
}

/// Agent-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum think-act iterations per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> u32 {
    10
}

/// How silent fallbacks (unknown task kinds, unclassifiable intents) are reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradationPolicy {
    /// Fall back quietly; only a debug log is emitted
    Silent,
    /// Fall back, log a warning and record it in the flow result metadata
    #[default]
    Surface,
}

impl std::str::FromStr for DegradationPolicy {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "silent" => Ok(DegradationPolicy::Silent),
            "surface" | "warn" => Ok(DegradationPolicy::Surface),
            _ => Err(crate::error::Error::Config(format!(
                "Invalid degradation policy: {}. Valid options: silent, surface",
                s
            ))),
        }
    }
}

/// Planning flow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Reporting policy for fallbacks
    #[serde(default)]
    pub degradation: DegradationPolicy,
    /// Inputs at or below this many characters are treated as casual chat
    #[serde(default = "default_short_input_chars")]
    pub short_input_chars: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        FlowConfig {
            degradation: DegradationPolicy::default(),
            short_input_chars: default_short_input_chars(),
        }
    }
}

fn default_short_input_chars() -> usize {
    5
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info,tripagent=debug".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
