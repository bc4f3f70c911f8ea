//! Tool registry - manages the tools available to agents
//!
//! Shared read-only behind an `Arc` once built. `execute` turns every
//! failure into a `ToolResult` error so the agent loop treats tool failures
//! as data.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::capability::infer_capabilities;
use super::traits::{Tool, ToolResult};
use crate::core::{ToolArgs, WorkerCapability};
use crate::error::ToolError;
use crate::gateway::ToolDefinition;

struct Entry {
    tool: Arc<dyn Tool>,
    capabilities: BTreeSet<WorkerCapability>,
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Entry>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, inferring its capabilities from name and description.
    ///
    /// A tool with the same name replaces the previous one.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let capabilities = infer_capabilities(tool.name(), tool.description());
        self.insert(Arc::new(tool), capabilities);
    }

    /// Register a tool with an explicit capability list
    pub fn register_with_capabilities<T: Tool + 'static>(
        &mut self,
        tool: T,
        capabilities: impl IntoIterator<Item = WorkerCapability>,
    ) {
        self.insert(Arc::new(tool), capabilities.into_iter().collect());
    }

    fn insert(&mut self, tool: Arc<dyn Tool>, capabilities: BTreeSet<WorkerCapability>) {
        let name = tool.name().to_string();
        debug!(tool = %name, ?capabilities, "Registering tool");
        if self.tools.insert(name.clone(), Entry { tool, capabilities }).is_some() {
            warn!(tool = %name, "Tool re-registered; previous definition replaced");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|e| e.tool.clone())
    }

    /// Capabilities recorded for a tool
    pub fn capabilities_of(&self, name: &str) -> Option<&BTreeSet<WorkerCapability>> {
        self.tools.get(name).map(|e| &e.capabilities)
    }

    /// Tools tagged with `capability`, in name order
    pub fn by_capability(&self, capability: WorkerCapability) -> Vec<Arc<dyn Tool>> {
        self.tools
            .values()
            .filter(|e| e.capabilities.contains(&capability))
            .map(|e| e.tool.clone())
            .collect()
    }

    /// Function-calling schemas for every tool, in name order
    pub fn to_schemas(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|e| e.tool.to_definition()).collect()
    }

    /// Execute a tool by name. Never fails; errors come back as `ToolResult` errors.
    pub async fn execute(&self, name: &str, args: ToolArgs) -> ToolResult {
        let Some(tool) = self.get(name) else {
            warn!(tool = %name, "Unknown tool requested");
            return ToolResult::failure(format!(
                "Unknown tool: {}. Available tools: {}",
                name,
                self.names().join(", ")
            ));
        };

        let missing = tool
            .required_parameters()
            .into_iter()
            .find(|p| !args.contains_key(p));
        if let Some(missing) = missing {
            return ToolError::MissingParameter(missing).into();
        }

        match tool.execute(args).await {
            Ok(result) => result,
            Err(err) => {
                warn!(tool = %name, error = %err, "Tool execution failed");
                err.into()
            }
        }
    }

    /// Get tool count
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// List tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}
