//! Prompt templates and engineering

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;

use crate::core::{SharedContext, Task, TaskKind, TaskStatus};
use crate::error::{Error, Result};

/// Longest context value rendered into a synthesis prompt
const CONTEXT_VALUE_CHARS: usize = 400;

/// A prompt template using Handlebars syntax
pub struct PromptTemplate {
    /// Template name
    name: String,
    /// Handlebars registry
    registry: Handlebars<'static>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(name: impl Into<String>, template: &str) -> Result<Self> {
        let name = name.into();
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);

        registry
            .register_template_string(&name, template)
            .map_err(|e| Error::Internal(format!("Invalid template: {}", e)))?;

        Ok(PromptTemplate { name, registry })
    }

    /// Render the template with given data
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        self.registry
            .render(&self.name, data)
            .map_err(|e| Error::Internal(format!("Template render error: {}", e)))
    }
}

/// System prompt for the primary agent (decomposition, single queries, general tasks)
pub const PRIMARY_SYSTEM_PROMPT: &str = r#"You are TripAgent, a travel-planning assistant.

## Guidelines
1. Use the available tools to look up real data instead of guessing
2. Quote prices with their currency (for example ¥1200)
3. Be concise and concrete; prefer lists of options with prices
4. When the task is done, call `terminate` or simply answer without tool calls
"#;

/// System prompt for the synthesis agent
pub const SYNTHESIS_SYSTEM_PROMPT: &str = r#"You are TripAgent's plan writer.
You receive the results of several specialist workers and combine them into one coherent,
well-structured travel plan. Do not invent prices or bookings that the workers did not
report; say so when something is missing."#;

/// System prompt for the intent classifier fallback
pub const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You classify user messages for a travel assistant.
Answer with exactly one label and nothing else."#;

/// System prompt for casual conversation
pub const CASUAL_CHAT_SYSTEM_PROMPT: &str = r#"You are TripAgent, a friendly travel assistant.
Chat naturally and briefly. If the user seems to want a trip planned or something looked up,
invite them to describe it."#;

/// Default system prompt for a worker of the given kind
pub fn worker_system_prompt(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Flight => {
            "You are TripAgent's flight specialist. Search flights with the available tools \
             and report flight numbers, times and prices with currency."
        }
        TaskKind::Hotel => {
            "You are TripAgent's hotel specialist. Find accommodation matching the user's \
             preferences and report names, locations and nightly prices with currency."
        }
        TaskKind::Route => {
            "You are TripAgent's route specialist. Plan day-by-day routes and local transport \
             between attractions, with travel times."
        }
        TaskKind::Budget => {
            "You are TripAgent's budget specialist. Combine the known costs into a budget \
             breakdown and check it against the user's limit."
        }
        TaskKind::General => PRIMARY_SYSTEM_PROMPT,
    }
}

/// Decomposition prompt template
pub const DECOMPOSITION_PROMPT: &str = r#"Break the travel request below into sub-tasks for
specialist workers.

**Request:** {{request}}

Available task kinds:
{{#each kinds}}
- {{this}}
{{/each}}

Reply with one numbered line per task, in this exact format:
N. [kind] description

For example:
1. [flight] 查询上海到北京的往返机票
2. [hotel] 搜索北京三晚的酒店
3. [budget] 汇总费用并核对预算

Put budget tasks last; they are run after the others finish. Do not add any other text.
"#;

/// Synthesis prompt template
pub const SYNTHESIS_PROMPT: &str = r#"Compose the final travel plan for this request:

**Request:** {{request}}

## Task Results
{{#each tasks}}
### [{{kind}}] {{description}} ({{status}})
{{#if result}}
{{result}}
{{/if}}
{{/each}}
{{#if context}}

## Shared Context
{{context}}
{{/if}}
"#;

/// Classification prompt template
pub const CLASSIFICATION_PROMPT: &str = r#"Classify the message into exactly one of these labels:
- complex_planning: the user wants a multi-part trip planned
- single_query: the user asks one concrete lookup (a flight, a hotel, a route, a price)
- casual_chat: anything else

**Message:** {{text}}

Label:"#;

/// Render the decomposition prompt for a request
pub fn decomposition_prompt(request: &str) -> Result<String> {
    let kinds: Vec<&str> = TaskKind::ALL.iter().map(|k| k.as_str()).collect();
    PromptTemplate::new("decomposition", DECOMPOSITION_PROMPT)?.render(&json!({
        "request": request,
        "kinds": kinds,
    }))
}

/// Render the synthesis prompt from task outcomes and the merged context
pub fn synthesis_prompt(request: &str, tasks: &[Task], context: &SharedContext) -> Result<String> {
    let tasks: Vec<serde_json::Value> = tasks
        .iter()
        .map(|t| {
            let status = match &t.status {
                TaskStatus::Pending => "pending".to_string(),
                TaskStatus::Running => "running".to_string(),
                TaskStatus::Completed => "completed".to_string(),
                TaskStatus::Failed(reason) => format!("failed: {}", reason),
            };
            json!({
                "kind": t.kind.as_str(),
                "description": t.description,
                "status": status,
                "result": t.result,
            })
        })
        .collect();

    let rendered_context = context.render(CONTEXT_VALUE_CHARS);
    PromptTemplate::new("synthesis", SYNTHESIS_PROMPT)?.render(&json!({
        "request": request,
        "tasks": tasks,
        "context": rendered_context,
    }))
}

/// Render the intent classification prompt
pub fn classification_prompt(text: &str) -> Result<String> {
    PromptTemplate::new("classification", CLASSIFICATION_PROMPT)?.render(&json!({ "text": text }))
}
