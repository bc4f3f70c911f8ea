//! Planning flow: decompose, execute in dependency order, synthesize.
//!
//! One run moves through `idle → planning → executing → completed`, or ends
//! in `failed` / `cancelled`. Parallel tasks are grouped into one unit per
//! worker; units run concurrently inside the flow's own task and report to a
//! single consumer over an mpsc channel, which owns every task and context
//! mutation. Dependent (budget) tasks run afterwards, one at a time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::extract::{cost_key, enrich_with_costs, extract_task_cost, extracted_costs};
use super::parser::parse_tasks;
use super::result::FlowResult;
use crate::agent::prompts::{
    decomposition_prompt, synthesis_prompt, worker_system_prompt, PRIMARY_SYSTEM_PROMPT,
    SYNTHESIS_SYSTEM_PROMPT,
};
use crate::agent::ToolCallingAgent;
use crate::config::{Config, DegradationPolicy, FlowConfig};
use crate::core::{SharedContext, Task, TaskKind, TaskStatus, WorkerCapability, EPHEMERAL_PREFIX};
use crate::error::{AgentError, FlowError};
use crate::gateway::LlmGateway;
use crate::memory::UserProfile;
use crate::tools::ToolRegistry;

/// Id of the agent that decomposes requests and answers general tasks
pub const PRIMARY_AGENT_ID: &str = "primary";

/// Id of the agent that writes the final plan
pub const SYNTHESIS_AGENT_ID: &str = "synthesis";

/// Lifecycle of a planning flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Planning,
    Executing,
    Completed,
    Failed(String),
    Cancelled,
}

impl FlowState {
    pub fn is_active(&self) -> bool {
        matches!(self, FlowState::Planning | FlowState::Executing)
    }
}

/// Progress reported by a parallel unit
#[derive(Debug)]
enum UnitEvent {
    Started(usize),
    Completed {
        index: usize,
        output: String,
        context: SharedContext,
        tool_results: Vec<String>,
    },
    Failed {
        index: usize,
        reason: String,
    },
}

#[derive(Debug)]
struct Job {
    index: usize,
    id: String,
    description: String,
}

/// Marks a run whose future was dropped mid-flight as cancelled
struct ActiveRun<'a> {
    flow: &'a PlanningFlow,
    token: CancellationToken,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        let mut state = self.flow.state.lock();
        if state.is_active() {
            *state = FlowState::Cancelled;
            self.token.cancel();
        }
    }
}

/// Orchestrates one planning request across worker agents
pub struct PlanningFlow {
    primary: Arc<ToolCallingAgent>,
    synthesizer: Arc<ToolCallingAgent>,
    workers: BTreeMap<String, Arc<ToolCallingAgent>>,
    degradation: DegradationPolicy,
    state: Mutex<FlowState>,
    tasks: Mutex<Vec<Task>>,
    context: Mutex<SharedContext>,
    cancel: Mutex<CancellationToken>,
}

impl std::fmt::Debug for PlanningFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanningFlow")
            .field("workers", &self.workers.keys().collect::<Vec<_>>())
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl PlanningFlow {
    pub fn new(
        primary: Arc<ToolCallingAgent>,
        synthesizer: Arc<ToolCallingAgent>,
        config: &FlowConfig,
    ) -> Self {
        PlanningFlow {
            primary,
            synthesizer,
            workers: BTreeMap::new(),
            degradation: config.degradation,
            state: Mutex::new(FlowState::Idle),
            tasks: Mutex::new(Vec::new()),
            context: Mutex::new(SharedContext::new()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// A flow with the primary and synthesis agents plus one worker per
    /// specialist task kind, all sharing `gateway` and `tools`
    pub fn with_default_workers(
        config: &Config,
        gateway: Arc<LlmGateway>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let agent = |id: &str, prompt: &str, capabilities: Vec<WorkerCapability>| {
            let (gateway, tools, memory) = (gateway.clone(), tools.clone(), config.memory.clone());
            Arc::new(
                ToolCallingAgent::with_memory_config(id, prompt, gateway, tools, memory)
                    .with_max_steps(config.agent.max_steps)
                    .with_capabilities(capabilities),
            )
        };

        let primary = agent(
            PRIMARY_AGENT_ID,
            PRIMARY_SYSTEM_PROMPT,
            vec![
                WorkerCapability::General,
                WorkerCapability::TravelPlanning,
                WorkerCapability::TextGeneration,
            ],
        );
        let synthesizer = agent(
            SYNTHESIS_AGENT_ID,
            SYNTHESIS_SYSTEM_PROMPT,
            vec![WorkerCapability::TextGeneration, WorkerCapability::TravelPlanning],
        );

        let mut flow = PlanningFlow::new(primary, synthesizer, &config.flow);
        for kind in [TaskKind::Flight, TaskKind::Hotel, TaskKind::Route, TaskKind::Budget] {
            flow.add_worker(agent(
                kind.worker_id(),
                worker_system_prompt(kind),
                vec![kind.required_capability(), WorkerCapability::TextGeneration],
            ));
        }
        flow
    }

    /// Register a worker under its agent id, replacing any previous one
    pub fn add_worker(&mut self, worker: Arc<ToolCallingAgent>) {
        self.workers.insert(worker.id().to_string(), worker);
    }

    pub fn with_worker(mut self, worker: Arc<ToolCallingAgent>) -> Self {
        self.add_worker(worker);
        self
    }

    pub fn primary(&self) -> &Arc<ToolCallingAgent> {
        &self.primary
    }

    pub fn state(&self) -> FlowState {
        self.state.lock().clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    pub fn context_snapshot(&self) -> SharedContext {
        self.context.lock().clone()
    }

    /// Cancel the current run. Running steps stop at their next checkpoint.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        *state = FlowState::Cancelled;
        self.cancel.lock().cancel();
        self.tasks.lock().clear();
        self.context.lock().clear();
        drop(state);
        info!("Planning flow cancelled");
    }

    /// Run the full flow for one request
    pub async fn execute(&self, request: &str) -> Result<FlowResult, FlowError> {
        let run = self.begin()?;
        let started = Instant::now();
        info!(request_chars = request.chars().count(), "Planning flow started");

        let outcome = self
            .run_phases(request, &run.token)
            .await
            .and_then(|result| {
                self.advance(&run.token, FlowState::Completed, None)?;
                Ok(result)
            });

        match outcome {
            Ok(mut result) => {
                result.execution_time_seconds = started.elapsed().as_secs_f64();
                info!(
                    tasks_completed = result.tasks_completed,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Planning flow completed"
                );
                Ok(result)
            }
            Err(err) => {
                *self.state.lock() = match err {
                    FlowError::Cancelled => FlowState::Cancelled,
                    _ => FlowState::Failed(err.to_string()),
                };
                self.context.lock().clear();
                error!(error = %err, "Planning flow failed");
                Err(err)
            }
        }
    }

    fn begin(&self) -> Result<ActiveRun<'_>, FlowError> {
        let mut state = self.state.lock();
        if state.is_active() {
            return Err(FlowError::AlreadyRunning);
        }
        *state = FlowState::Planning;

        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        self.tasks.lock().clear();
        self.context.lock().clear();
        Ok(ActiveRun { flow: self, token })
    }

    /// Move the run to `next`, optionally installing its task list, unless it
    /// was cancelled. The token is checked under the state lock, which
    /// `cancel` also holds while it cancels.
    fn advance(
        &self,
        token: &CancellationToken,
        next: FlowState,
        tasks: Option<Vec<Task>>,
    ) -> Result<(), FlowError> {
        let mut state = self.state.lock();
        if token.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        if let Some(tasks) = tasks {
            *self.tasks.lock() = tasks;
        }
        *state = next;
        Ok(())
    }

    async fn run_phases(
        &self,
        request: &str,
        token: &CancellationToken,
    ) -> Result<FlowResult, FlowError> {
        self.seed_context(request);

        let prompt = decomposition_prompt(request)
            .map_err(|e| FlowError::TaskExecutionFailed(e.to_string()))?;
        let reply = self
            .primary
            .run_prompt(&prompt, token)
            .await
            .map_err(|e| stage_failure("decomposition", e))?;
        ensure_live(token)?;

        let plan = parse_tasks(&reply, request);
        let warnings = self.report_degradations(&plan.warnings);
        self.check_assignments(&plan.tasks)?;
        info!(tasks = plan.tasks.len(), "Request decomposed");

        self.advance(token, FlowState::Executing, Some(plan.tasks))?;

        self.run_parallel_phase(token).await;
        ensure_live(token)?;

        self.run_dependent_phase(token).await?;
        ensure_live(token)?;

        let output = self.synthesize(request, token).await?;
        ensure_live(token)?;

        Ok(self.build_result(output, &warnings))
    }

    /// Start the shared context with the request and whatever the request
    /// itself says about destination, budget and preferences
    fn seed_context(&self, request: &str) {
        self.primary.learn_from_user(request);
        let mut profile = UserProfile::default();
        profile.learn(request);

        let mut context = self.context.lock();
        context.insert("request", request);
        for (key, value) in &profile.knowledge {
            context.insert(key.clone(), value.clone());
        }
        for (category, value) in &profile.preferences {
            context.insert(format!("preference_{}", category), value.clone());
        }
    }

    fn report_degradations(&self, warnings: &[String]) -> Vec<String> {
        for warning in warnings {
            match self.degradation {
                DegradationPolicy::Silent => debug!(warning = %warning, "Decomposition degraded"),
                DegradationPolicy::Surface => warn!(warning = %warning, "Decomposition degraded"),
            }
        }
        match self.degradation {
            DegradationPolicy::Silent => Vec::new(),
            DegradationPolicy::Surface => warnings.to_vec(),
        }
    }

    fn worker(&self, id: &str) -> Option<Arc<ToolCallingAgent>> {
        self.workers
            .get(id)
            .cloned()
            .or_else(|| (id == TaskKind::General.worker_id()).then(|| self.primary.clone()))
    }

    fn check_assignments(&self, tasks: &[Task]) -> Result<(), FlowError> {
        for task in tasks {
            let worker = self
                .worker(&task.assigned_worker)
                .ok_or_else(|| FlowError::WorkerNotFound(task.assigned_worker.clone()))?;
            let required = task.kind.required_capability();
            if !worker.has_capability(required) {
                return Err(FlowError::InvalidConfiguration(format!(
                    "worker '{}' lacks capability {} required by {}",
                    worker.id(),
                    required,
                    task.id
                )));
            }
        }
        Ok(())
    }

    /// Group parallel tasks by worker, keeping parse order within each unit
    fn parallel_units(&self) -> Vec<(Arc<ToolCallingAgent>, Vec<Job>)> {
        let tasks = self.tasks.lock();
        let mut units: Vec<(String, Vec<Job>)> = Vec::new();

        for (index, task) in tasks.iter().enumerate() {
            if task.kind.is_dependent() {
                continue;
            }
            let job = Job {
                index,
                id: task.id.clone(),
                description: task.description.clone(),
            };
            match units.iter_mut().find(|(worker, _)| *worker == task.assigned_worker) {
                Some((_, jobs)) => jobs.push(job),
                None => units.push((task.assigned_worker.clone(), vec![job])),
            }
        }

        units
            .into_iter()
            .filter_map(|(id, jobs)| self.worker(&id).map(|worker| (worker, jobs)))
            .collect()
    }

    async fn run_parallel_phase(&self, token: &CancellationToken) {
        let units = self.parallel_units();
        if units.is_empty() {
            return;
        }
        info!(units = units.len(), "Parallel phase started");

        let base = self.context.lock().clone();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut running: FuturesUnordered<_> = units
            .into_iter()
            .map(|(worker, jobs)| run_unit(worker, jobs, base.clone(), tx.clone(), token.clone()))
            .collect();
        drop(tx);

        let drive = async { while running.next().await.is_some() {} };
        let consume = async {
            while let Some(event) = rx.recv().await {
                self.apply(event);
            }
        };
        tokio::join!(drive, consume);

        info!("Parallel phase finished");
    }

    async fn run_dependent_phase(&self, token: &CancellationToken) -> Result<(), FlowError> {
        let indices: Vec<usize> = self
            .tasks
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, task)| task.kind.is_dependent())
            .map(|(index, _)| index)
            .collect();

        for index in indices {
            ensure_live(token)?;
            let (id, worker_id, description) = {
                let tasks = self.tasks.lock();
                let task = tasks.get(index).ok_or(FlowError::Cancelled)?;
                (task.id.clone(), task.assigned_worker.clone(), task.description.clone())
            };
            let worker = self
                .worker(&worker_id)
                .ok_or_else(|| FlowError::WorkerNotFound(worker_id.clone()))?;

            let shared = self.context.lock().clone();
            let enriched = enrich_with_costs(&description, &shared);
            worker.set_context(shared);

            info!(task = %id, worker = %worker_id, "Dependent task started");
            self.apply(UnitEvent::Started(index));
            let before = worker.context_snapshot();
            match worker.run_prompt(&enriched, token).await {
                Ok(output) => {
                    let context = worker.context_snapshot();
                    self.apply(UnitEvent::Completed {
                        index,
                        output,
                        tool_results: fresh_tool_results(&before, &context),
                        context,
                    })
                }
                Err(AgentError::Cancelled) => return Err(FlowError::Cancelled),
                Err(e) => {
                    self.apply(UnitEvent::Failed {
                        index,
                        reason: e.to_string(),
                    });
                    return Err(FlowError::ExecutionTimeout(format!(
                        "{} ({}) failed: {}",
                        id, worker_id, e
                    )));
                }
            }
        }
        Ok(())
    }

    async fn synthesize(
        &self,
        request: &str,
        token: &CancellationToken,
    ) -> Result<String, FlowError> {
        let tasks = self.tasks();
        let context = self.context_snapshot();
        let prompt = synthesis_prompt(request, &tasks, &context)
            .map_err(|e| FlowError::TaskExecutionFailed(e.to_string()))?;

        info!("Synthesis started");
        self.synthesizer.set_context(SharedContext::new());
        self.synthesizer
            .run_prompt(&prompt, token)
            .await
            .map_err(|e| stage_failure("synthesis", e))
    }

    /// Single consumer of unit events; owns every task and context mutation
    fn apply(&self, event: UnitEvent) {
        let mut tasks = self.tasks.lock();
        match event {
            UnitEvent::Started(index) => {
                if let Some(task) = tasks.get_mut(index) {
                    task.status = TaskStatus::Running;
                    debug!(task = %task.id, "Task running");
                }
            }
            UnitEvent::Completed {
                index,
                output,
                context,
                tool_results,
            } => {
                let Some(task) = tasks.get_mut(index) else {
                    return;
                };
                task.status = TaskStatus::Completed;
                task.result = Some(output.clone());
                let (id, kind) = (task.id.clone(), task.kind);
                drop(tasks);

                let mut shared = self.context.lock();
                let merged = shared.merge_from(&context);
                if let Some(cost) = extract_task_cost(&output, &tool_results) {
                    let key = cost_key(kind);
                    let lowest = shared.get_f64(&key).map_or(cost, |existing| existing.min(cost));
                    shared.insert(key, lowest);
                }
                info!(task = %id, merged_keys = merged, "Task completed");
            }
            UnitEvent::Failed { index, reason } => {
                if let Some(task) = tasks.get_mut(index) {
                    warn!(task = %task.id, reason = %reason, "Task failed");
                    task.status = TaskStatus::Failed(reason);
                }
            }
        }
    }

    fn build_result(&self, output: String, warnings: &[String]) -> FlowResult {
        let tasks = self.tasks.lock();
        let completed = tasks.iter().filter(|t| t.is_completed()).count();
        let failed = tasks.iter().filter(|t| t.is_failed()).count();

        let mut result = FlowResult::success(output, std::time::Duration::ZERO, completed)
            .with_metadata("total_tasks", tasks.len())
            .with_metadata("failed_tasks", failed);
        for (key, value) in extracted_costs(&self.context.lock()) {
            result = result.with_metadata(key, value);
        }
        result.with_warnings(warnings)
    }
}

/// Run one worker's tasks in order; the first failure fails the rest
async fn run_unit(
    worker: Arc<ToolCallingAgent>,
    jobs: Vec<Job>,
    context: SharedContext,
    events: mpsc::UnboundedSender<UnitEvent>,
    cancel: CancellationToken,
) {
    worker.set_context(context);
    let mut jobs = jobs.into_iter();

    while let Some(job) = jobs.next() {
        debug!(worker = %worker.id(), task = %job.id, "Unit task started");
        let _ = events.send(UnitEvent::Started(job.index));

        let before = worker.context_snapshot();
        match worker.run_prompt(&job.description, &cancel).await {
            Ok(output) => {
                let context = worker.context_snapshot();
                let _ = events.send(UnitEvent::Completed {
                    index: job.index,
                    output,
                    tool_results: fresh_tool_results(&before, &context),
                    context,
                });
            }
            Err(e) => {
                let _ = events.send(UnitEvent::Failed {
                    index: job.index,
                    reason: e.to_string(),
                });
                for skipped in jobs {
                    let _ = events.send(UnitEvent::Failed {
                        index: skipped.index,
                        reason: format!("skipped after {} failed", job.id),
                    });
                }
                return;
            }
        }
    }
}

/// Tool results a worker published during one task
fn fresh_tool_results(before: &SharedContext, after: &SharedContext) -> Vec<String> {
    after
        .with_prefix(EPHEMERAL_PREFIX)
        .filter(|(key, value)| key.ends_with("_result") && before.get(key) != Some(*value))
        .filter_map(|(_, value)| value.as_str().map(str::to_string))
        .collect()
}

fn ensure_live(token: &CancellationToken) -> Result<(), FlowError> {
    if token.is_cancelled() {
        Err(FlowError::Cancelled)
    } else {
        Ok(())
    }
}

fn stage_failure(stage: &str, err: AgentError) -> FlowError {
    match err {
        AgentError::Cancelled => FlowError::Cancelled,
        other => FlowError::TaskExecutionFailed(format!("{} failed: {}", stage, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Role;
    use crate::error::GatewayError;
    use crate::gateway::types::ChatCompletionRequest;
    use crate::gateway::ChatTransport;
    use crate::testing::{
        gateway_over, last_user_content, system_prompt, text_reply, tool_reply, FnTransport,
        MockTool, Reply,
    };
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    const PLAN: &str = "1. [flight] 查询上海到北京的机票\n\
                        2. [hotel] 搜索北京酒店三晚\n\
                        3. [route] 规划三日游路线\n\
                        4. [budget] 汇总费用并核对预算";

    /// Which agent sent a request, from its system prompt
    fn sender(request: &ChatCompletionRequest) -> &'static str {
        let prompt = system_prompt(request);
        if prompt.contains("flight specialist") {
            "flight"
        } else if prompt.contains("hotel specialist") {
            "hotel"
        } else if prompt.contains("route specialist") {
            "route"
        } else if prompt.contains("budget specialist") {
            "budget"
        } else if prompt.contains("plan writer") {
            "synthesis"
        } else if last_user_content(request).starts_with("Break the travel request") {
            "decomposition"
        } else {
            "general"
        }
    }

    /// Transport that answers every agent, recording who called in what order
    fn travel_transport(
        plan: &'static str,
        overrides: impl Fn(&'static str, &ChatCompletionRequest) -> Option<Reply>
            + Send
            + Sync
            + 'static,
    ) -> (Arc<FnTransport>, Arc<Mutex<Vec<&'static str>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = log.clone();
        let transport = FnTransport::new(move |request| {
            let who = sender(request);
            calls.lock().push(who);
            if let Some(reply) = overrides(who, request) {
                return reply;
            }
            Ok(text_reply(match who {
                "decomposition" => plan,
                "flight" => "推荐CA1501 ¥1200，MU5101 ¥980",
                "hotel" => "全季酒店 ¥400/晚，三晚共¥1200",
                "route" => "Day1 故宫；Day2 长城；Day3 颐和园",
                "budget" => "合计约¥2180，在预算内",
                "synthesis" => "北京三日游计划",
                _ => "general answer",
            }))
        });
        (Arc::new(transport), log)
    }

    fn flow_over(transport: Arc<dyn ChatTransport>, config: &Config) -> PlanningFlow {
        let tools = Arc::new(ToolRegistry::new());
        PlanningFlow::with_default_workers(config, gateway_over(transport), tools)
    }

    #[tokio::test]
    async fn test_budget_runs_after_parallel_phase_with_costs() {
        let (transport, log) = travel_transport(PLAN, |who, request| {
            (who == "budget").then(|| {
                let content = last_user_content(request);
                assert!(content.contains("- extracted_flight_cost: 980"));
                assert!(content.contains("- extracted_hotel_cost: 1200"));
                Ok(text_reply("合计约¥2180，在预算内"))
            })
        });
        let flow = flow_over(transport, &Config::default());

        let result = assert_ok!(flow.execute("帮我规划北京三天游，预算5000").await);

        assert!(result.success);
        assert_eq!(result.output, "北京三日游计划");
        assert_eq!(result.tasks_completed, 4);
        assert_eq!(result.metadata["total_tasks"], 4);
        assert_eq!(result.metadata["failed_tasks"], 0);
        assert_eq!(result.metadata["extracted_flight_cost"], 980.0);
        assert_eq!(result.metadata["extracted_hotel_cost"], 1200.0);
        assert_eq!(flow.state(), FlowState::Completed);

        let calls = log.lock().clone();
        let position = |who| calls.iter().position(|c| *c == who).unwrap();
        assert_eq!(calls[0], "decomposition");
        for parallel in ["flight", "hotel", "route"] {
            assert!(position(parallel) < position("budget"));
        }
        assert_eq!(*calls.last().unwrap(), "synthesis");

        let context = flow.context_snapshot();
        assert_eq!(context.get_str("destination"), Some("北京"));
        assert_eq!(context.with_prefix("last_").count(), 0);
    }

    #[tokio::test]
    async fn test_parallel_failure_is_isolated() {
        let (transport, _) = travel_transport(PLAN, |who, _| {
            (who == "hotel").then(|| Err(GatewayError::Api("hotel backend down".into())))
        });
        let flow = flow_over(transport, &Config::default());

        let result = flow.execute("帮我规划北京三天游，预算5000").await.unwrap();

        assert!(result.success);
        assert_eq!(result.tasks_completed, 3);
        assert_eq!(result.metadata["failed_tasks"], 1);
        let tasks = flow.tasks();
        assert!(tasks[1].is_failed());
        assert!(tasks[0].is_completed() && tasks[2].is_completed() && tasks[3].is_completed());
    }

    #[tokio::test]
    async fn test_failure_aborts_rest_of_unit() {
        let plan = "1. [flight] 去程机票\n2. [flight] 回程机票\n3. [route] 市内路线";
        let (transport, log) = travel_transport(plan, |who, _| {
            (who == "flight").then(|| Err(GatewayError::Api("flight backend down".into())))
        });
        let flow = flow_over(transport, &Config::default());

        let result = flow.execute("规划北京行程").await.unwrap();

        assert_eq!(log.lock().iter().filter(|c| **c == "flight").count(), 1);
        let tasks = flow.tasks();
        assert!(tasks[0].is_failed());
        assert_eq!(tasks[1].status, TaskStatus::Failed("skipped after task-1 failed".into()));
        assert!(tasks[2].is_completed());
        assert_eq!(result.tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_dependent_failure_is_fatal() {
        let (transport, log) = travel_transport(PLAN, |who, _| {
            (who == "budget").then(|| Err(GatewayError::Api("budget model down".into())))
        });
        let flow = flow_over(transport, &Config::default());

        let err = assert_err!(flow.execute("帮我规划北京三天游，预算5000").await);

        assert!(matches!(err, FlowError::ExecutionTimeout(_)));
        assert!(matches!(flow.state(), FlowState::Failed(_)));
        assert!(flow.context_snapshot().is_empty());
        assert!(!log.lock().contains(&"synthesis"));
    }

    #[tokio::test]
    async fn test_missing_worker_fails_before_dispatch() {
        let (transport, log) = travel_transport(PLAN, |_, _| None);
        let gateway = gateway_over(transport);
        let tools = Arc::new(ToolRegistry::new());
        let agent = |id: &str, prompt: &str| {
            ToolCallingAgent::new(id, prompt, gateway.clone(), tools.clone())
        };
        let flow = PlanningFlow::new(
            Arc::new(agent(PRIMARY_AGENT_ID, PRIMARY_SYSTEM_PROMPT)),
            Arc::new(agent(SYNTHESIS_AGENT_ID, SYNTHESIS_SYSTEM_PROMPT)),
            &FlowConfig::default(),
        )
        .with_worker(Arc::new(
            agent("flight", worker_system_prompt(TaskKind::Flight))
                .with_capabilities([WorkerCapability::FlightSearch]),
        ));

        let err = flow.execute("帮我规划北京三天游").await.unwrap_err();

        assert!(matches!(err, FlowError::WorkerNotFound(ref id) if id == "hotel"));
        assert_eq!(*log.lock(), vec!["decomposition"]);
    }

    #[tokio::test]
    async fn test_capability_mismatch_is_invalid_configuration() {
        let (transport, _) = travel_transport("1. [flight] 查机票", |_, _| None);
        let gateway = gateway_over(transport);
        let tools = Arc::new(ToolRegistry::new());
        let mut flow =
            PlanningFlow::with_default_workers(&Config::default(), gateway.clone(), tools.clone());
        flow.add_worker(Arc::new(
            ToolCallingAgent::new("flight", worker_system_prompt(TaskKind::Flight), gateway, tools)
                .with_capabilities([WorkerCapability::TextGeneration]),
        ));

        let err = flow.execute("规划行程").await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_second_execute_while_running_is_rejected() {
        let (transport, _) = travel_transport(PLAN, |_, _| None);
        let flow = flow_over(transport, &Config::default());

        let first = flow.execute("帮我规划北京三天游");
        tokio::pin!(first);
        assert!(futures::poll!(&mut first).is_pending());
        assert_eq!(flow.state(), FlowState::Planning);

        let err = flow.execute("再规划一次").await.unwrap_err();
        assert!(matches!(err, FlowError::AlreadyRunning));

        assert!(first.await.unwrap().success);
    }

    #[tokio::test]
    async fn test_cancel_stops_run_and_clears_state() {
        let (transport, log) = travel_transport(PLAN, |_, _| None);
        let flow = flow_over(transport, &Config::default());

        let run = flow.execute("帮我规划北京三天游");
        tokio::pin!(run);
        assert!(futures::poll!(&mut run).is_pending());

        flow.cancel();
        let err = run.await.unwrap_err();

        assert!(matches!(err, FlowError::Cancelled));
        assert_eq!(flow.state(), FlowState::Cancelled);
        assert!(flow.tasks().is_empty());
        assert!(flow.context_snapshot().is_empty());
        assert_eq!(*log.lock(), vec!["decomposition"]);
    }

    #[tokio::test]
    async fn test_unparseable_plan_runs_request_on_primary() {
        let (transport, log) = travel_transport("Sure, happy to help!", |_, _| None);
        let flow = flow_over(transport, &Config::default());

        let result = flow.execute("帮我规划北京三天游").await.unwrap();

        assert!(result.success);
        assert_eq!(result.tasks_completed, 1);
        assert_eq!(result.warnings().len(), 1);
        assert_eq!(*log.lock(), vec!["decomposition", "general", "synthesis"]);
    }

    #[tokio::test]
    async fn test_silent_policy_keeps_warnings_out_of_result() {
        let (transport, _) = travel_transport("1. [visa] 办签证", |_, _| None);
        let mut config = Config::default();
        config.flow.degradation = DegradationPolicy::Silent;
        let flow = flow_over(transport, &config);

        let result = flow.execute("规划行程").await.unwrap();

        assert!(result.success);
        assert!(result.warnings().is_empty());
        assert_eq!(flow.tasks()[0].kind, TaskKind::General);
    }

    #[tokio::test]
    async fn test_costs_found_only_in_tool_results_reach_budget() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool::with_output(
            "search_flights",
            "Search flights",
            &["to"],
            "CA1501 ¥1200；MU5101 ¥980",
        ));
        registry.register(MockTool::with_output(
            "search_hotels",
            "Search hotels",
            &["city"],
            "全季酒店 ¥400/晚，三晚共¥1200",
        ));
        let (transport, log) = travel_transport(PLAN, |who, request| {
            let answered = request.messages.last().is_some_and(|m| m.role == Role::Tool);
            match (who, answered) {
                ("flight", false) => {
                    let call = ("f1", "search_flights", json!({"to": "北京"}));
                    Some(Ok(tool_reply("", &[call])))
                }
                ("flight", true) => Some(Ok(text_reply("已为您找到合适的航班"))),
                ("hotel", false) => {
                    let call = ("h1", "search_hotels", json!({"city": "北京"}));
                    Some(Ok(tool_reply("", &[call])))
                }
                ("hotel", true) => Some(Ok(text_reply("已为您找到合适的酒店"))),
                ("budget", _) => {
                    let content = last_user_content(request);
                    assert!(content.contains("Known costs:"));
                    assert!(content.contains("- extracted_flight_cost: 980"));
                    assert!(content.contains("- extracted_hotel_cost: 1200"));
                    None
                }
                _ => None,
            }
        });
        let (gateway, tools) = (gateway_over(transport), Arc::new(registry));
        let flow = PlanningFlow::with_default_workers(&Config::default(), gateway, tools);

        let result = assert_ok!(flow.execute("帮我规划北京三天游，预算5000").await);

        assert!(result.success);
        assert_eq!(result.tasks_completed, 4);
        assert_eq!(result.metadata["extracted_flight_cost"], 980.0);
        assert_eq!(result.metadata["extracted_hotel_cost"], 1200.0);
        assert_eq!(log.lock().iter().filter(|c| **c == "flight").count(), 2);
        assert_eq!(flow.context_snapshot().with_prefix("last_").count(), 0);
    }

    #[tokio::test]
    async fn test_primary_learns_only_from_the_user_request() {
        let (transport, _) = travel_transport("1. [general] Plan the Kyoto itinerary", |_, _| None);
        let flow = flow_over(transport, &Config::default());

        assert_ok!(flow.execute("Plan a 3-day trip to Kyoto").await);

        let memory = flow.primary().memory_snapshot();
        assert_eq!(memory.knowledge().get("destination").map(String::as_str), Some("Kyoto"));
        assert_eq!(flow.context_snapshot().get_str("destination"), Some("Kyoto"));
    }

    #[tokio::test]
    async fn test_cancel_before_execution_keeps_run_cancelled() {
        let (transport, _) = travel_transport(PLAN, |_, _| None);
        let flow = flow_over(transport, &Config::default());
        let tasks = parse_tasks(PLAN, "帮我规划北京三天游").tasks;

        let run = assert_ok!(flow.begin());
        flow.cancel();
        let err = assert_err!(flow.advance(&run.token, FlowState::Executing, Some(tasks)));

        assert!(matches!(err, FlowError::Cancelled));
        assert_eq!(flow.state(), FlowState::Cancelled);
        assert!(flow.tasks().is_empty());
    }
}
