//! Agent module - the tool-calling worker and prompt engineering
//!
//! - tool_agent.rs: `ToolCallingAgent`, the bounded think-act executor
//! - prompts.rs: system prompts and Handlebars templates for decomposition,
//!   synthesis and intent classification

pub mod prompts;
pub mod tool_agent;

pub use prompts::PromptTemplate;
pub use tool_agent::{AgentStatus, ToolCallingAgent, DEFAULT_MAX_STEPS};
