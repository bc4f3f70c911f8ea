//! Tools module - callable tool contract and registry
//!
//! Each tool implements the `Tool` trait and is registered into a
//! `ToolRegistry`, which is shared by every agent in a process. Domain tools
//! (flight, hotel, route and budget lookups) live outside this crate and only
//! need to satisfy the trait.
//!
//! ## Adding a New Tool
//!
//! 1. Implement the `Tool` trait
//! 2. List required parameters under `required` in `parameters_schema`
//! 3. Register it with `register` or `register_with_capabilities`

mod capability;
mod registry;
mod terminate;
mod traits;

pub use capability::infer_capabilities;
pub use registry::ToolRegistry;
pub use terminate::{TerminateTool, TERMINATE_TOOL_NAME};
pub use traits::{Tool, ToolResult};
