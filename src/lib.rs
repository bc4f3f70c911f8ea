//! # TripAgent
//!
//! An agentic travel-task orchestration engine built with Rust.
//!
//! ## Overview
//!
//! - **Intent routing:** keyword rules first, one model call when they don't fire
//! - **Planning flow:** decomposition into typed tasks, per-worker parallel
//!   execution, a dependent budget phase and a final synthesis
//! - **Tool-calling agents:** bounded think-act loops over a shared tool registry
//! - **LLM gateway:** OpenAI-compatible chat completions with retry, backoff
//!   and usage accounting
//! - **Working memory:** importance scoring, compaction and preference learning

pub mod agent;
pub mod config;
pub mod core;
pub mod error;
pub mod flow;
pub mod gateway;
pub mod memory;
pub mod router;
pub mod tools;

#[cfg(test)]
mod testing;

pub use agent::ToolCallingAgent;
pub use config::Config;
pub use error::{Error, Result};
pub use flow::{FlowResult, PlanningFlow, RequestDispatcher};
pub use gateway::{LlmGateway, UsageMonitor};
pub use router::{Intent, IntentRouter};
pub use tools::{Tool, ToolRegistry};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
