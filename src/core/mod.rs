//! Core module - data model shared by every layer
//!
//! - types.rs: conversation messages, roles and tool calls
//! - task.rs: tasks, task kinds and worker capabilities
//! - context.rs: the shared context value type and merge rules

pub mod context;
pub mod task;
pub mod types;

pub use context::{ContextValue, SharedContext, EPHEMERAL_PREFIX};
pub use task::{Task, TaskKind, TaskStatus, WorkerCapability};
pub use types::{ArgValue, Message, MessageMetadata, Role, ToolArgs, ToolCall};
