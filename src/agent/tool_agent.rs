//! Tool-calling agent: a single-flight think-act executor.
//!
//! Each agent owns its working memory and a private copy of the shared
//! context. `run` drives the loop: ask the gateway with the registry's
//! schemas, execute requested tools, feed results back, and stop when the
//! model answers without tools, calls `terminate`, or the step budget runs
//! out.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::core::{Message, SharedContext, WorkerCapability, EPHEMERAL_PREFIX};
use crate::error::AgentError;
use crate::gateway::{LlmGateway, ToolChoice};
use crate::memory::WorkingMemory;
use crate::tools::{ToolRegistry, TERMINATE_TOOL_NAME};

/// Default think-act step budget
pub const DEFAULT_MAX_STEPS: u32 = 10;

/// Longest context value injected into a request
const INJECTED_VALUE_CHARS: usize = 500;

/// Lifecycle of an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    Idle,
    Working,
    Failed(String),
}

/// Who wrote the text a run starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Author {
    User,
    Orchestrator,
}

/// Resets the agent to idle when a run ends, including when its future is dropped
struct RunGuard<'a> {
    status: &'a Mutex<AgentStatus>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.status.lock() = AgentStatus::Idle;
    }
}

/// An agent that answers requests with a bounded think-act loop
pub struct ToolCallingAgent {
    id: String,
    capabilities: BTreeSet<WorkerCapability>,
    gateway: Arc<LlmGateway>,
    tools: Arc<ToolRegistry>,
    max_steps: u32,
    status: Mutex<AgentStatus>,
    memory: Mutex<WorkingMemory>,
    context: Mutex<SharedContext>,
}

impl std::fmt::Debug for ToolCallingAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallingAgent")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("max_steps", &self.max_steps)
            .field("status", &*self.status.lock())
            .finish_non_exhaustive()
    }
}

impl ToolCallingAgent {
    /// Create an idle agent whose memory starts with `system_prompt`
    pub fn new(
        id: impl Into<String>,
        system_prompt: impl Into<String>,
        gateway: Arc<LlmGateway>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self::with_memory_config(id, system_prompt, gateway, tools, MemoryConfig::default())
    }

    pub fn with_memory_config(
        id: impl Into<String>,
        system_prompt: impl Into<String>,
        gateway: Arc<LlmGateway>,
        tools: Arc<ToolRegistry>,
        memory_config: MemoryConfig,
    ) -> Self {
        let mut memory = WorkingMemory::new(memory_config);
        memory.add_message(Message::system(system_prompt));

        ToolCallingAgent {
            id: id.into(),
            capabilities: BTreeSet::from([WorkerCapability::General]),
            gateway,
            tools,
            max_steps: DEFAULT_MAX_STEPS,
            status: Mutex::new(AgentStatus::Idle),
            memory: Mutex::new(memory),
            context: Mutex::new(SharedContext::new()),
        }
    }

    /// Replace the declared capability set
    pub fn with_capabilities(
        mut self,
        capabilities: impl IntoIterator<Item = WorkerCapability>,
    ) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capabilities(&self) -> &BTreeSet<WorkerCapability> {
        &self.capabilities
    }

    pub fn has_capability(&self, capability: WorkerCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn status(&self) -> AgentStatus {
        self.status.lock().clone()
    }

    pub fn gateway(&self) -> &Arc<LlmGateway> {
        &self.gateway
    }

    /// Replace the agent's copy of the shared context
    pub fn set_context(&self, context: SharedContext) {
        *self.context.lock() = context;
    }

    pub fn context_snapshot(&self) -> SharedContext {
        self.context.lock().clone()
    }

    /// Copy of the agent's working memory
    pub fn memory_snapshot(&self) -> WorkingMemory {
        self.memory.lock().clone()
    }

    /// Partial memory reset (see `WorkingMemory::clear`)
    pub fn clear_memory(&self) {
        self.memory.lock().clear();
    }

    /// Feed user-authored text to the agent's learned profile
    pub fn learn_from_user(&self, text: &str) {
        self.memory.lock().learn_from_user(text);
    }

    /// Run the think-act loop for a request the user wrote.
    ///
    /// Fails with `ConcurrentExecution` if a run is already in progress.
    pub async fn run(
        &self,
        request: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        self.run_as(request, Author::User, cancel).await
    }

    /// Run the think-act loop for a prompt the orchestrator wrote. Nothing is
    /// learned about the user from it.
    pub async fn run_prompt(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        self.run_as(prompt, Author::Orchestrator, cancel).await
    }

    async fn run_as(
        &self,
        request: &str,
        author: Author,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let request = request.trim();
        if request.is_empty() {
            return Err(AgentError::InvalidRequest("request is empty".to_string()));
        }

        let _guard = self.begin()?;
        let started = Instant::now();
        info!(agent = %self.id, "Agent run started");

        if author == Author::User {
            self.learn_from_user(request);
        }
        let result = self.think_act(request, cancel).await;
        match &result {
            Ok(output) => info!(
                agent = %self.id,
                duration_ms = started.elapsed().as_millis() as u64,
                output_chars = output.chars().count(),
                "Agent run completed"
            ),
            Err(err) => {
                *self.status.lock() = AgentStatus::Failed(err.to_string());
                warn!(agent = %self.id, error = %err, "Agent run failed");
            }
        }
        result
    }

    fn begin(&self) -> Result<RunGuard<'_>, AgentError> {
        let mut status = self.status.lock();
        if *status != AgentStatus::Idle {
            return Err(AgentError::ConcurrentExecution(self.id.clone()));
        }
        *status = AgentStatus::Working;
        Ok(RunGuard { status: &self.status })
    }

    async fn think_act(
        &self,
        request: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let user_message = self.with_injected_context(request);
        self.memory.lock().add_generated(Message::user(user_message));

        let schemas = self.tools.to_schemas();
        let mut last_text = String::new();

        for step in 1..=self.max_steps {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            debug!(agent = %self.id, step, max_steps = self.max_steps, "Think");

            let window = self.memory.lock().context_messages();
            let response = self.gateway.ask_with_tools(&window, &schemas, ToolChoice::Auto).await?;
            let text = response.text_or_empty().to_string();

            if !text.is_empty() || response.has_tool_calls() {
                self.memory.lock().add_message(Message::assistant_with_tool_calls(
                    text.clone(),
                    response.tool_calls.clone(),
                ));
            }
            if !text.is_empty() {
                last_text = text.clone();
            }

            if !response.has_tool_calls() {
                return Ok(text);
            }

            let mut terminate_output = None;
            for call in &response.tool_calls {
                if cancel.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }
                debug!(agent = %self.id, step, tool = %call.tool_name, "Act");

                let result = self.tools.execute(&call.tool_name, call.arguments.clone()).await;
                let content = result.to_content();
                if result.is_error() {
                    warn!(agent = %self.id, tool = %call.tool_name, "Tool returned an error");
                }

                self.memory.lock().add_message(Message::tool(
                    call.id.clone(),
                    call.tool_name.clone(),
                    content.clone(),
                ));
                let key = format!("{}{}_result", EPHEMERAL_PREFIX, call.tool_name);
                self.context.lock().insert(key, content.clone());

                if call.tool_name == TERMINATE_TOOL_NAME {
                    terminate_output = Some(content);
                }
            }

            if let Some(output) = terminate_output {
                info!(agent = %self.id, step, "Terminate requested");
                return Ok(if last_text.is_empty() { output } else { last_text });
            }
        }

        Err(AgentError::MaxStepsExceeded(self.max_steps))
    }

    /// Append a rendering of the agent's context to the request, skipping ephemeral keys
    fn with_injected_context(&self, request: &str) -> String {
        let context = self.context.lock();
        let mut visible = SharedContext::new();
        visible.merge_from(&context);
        if visible.is_empty() {
            request.to_string()
        } else {
            format!("{}\n\nShared context:\n{}", request, visible.render(INJECTED_VALUE_CHARS))
        }
    }
}
