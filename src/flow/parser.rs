//! Decomposition output parsing
//!
//! The primary agent answers with one `N. [kind] description` line per task.
//! Numbered lines without a usable kind become general tasks; anything else
//! is chatter and is skipped.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::{Task, TaskKind};

static TASK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)[.、)]\s*\[([^\]]+)\]\s*(.+)$").expect("task line regex")
});

static NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)[.、)]\s*(.+)$").expect("numbered line regex"));

/// Tasks parsed from a decomposition reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPlan {
    pub tasks: Vec<Task>,
    /// Lines that fell back to a general task, or the whole-request fallback
    pub warnings: Vec<String>,
}

/// Parse a decomposition reply. Never returns an empty plan: if no line
/// parses, the whole `request` becomes one general task.
pub fn parse_tasks(reply: &str, request: &str) -> ParsedPlan {
    let mut plan = ParsedPlan::default();

    for line in reply.lines() {
        let line = strip_markdown(line);

        let (kind, description) = if let Some(caps) = TASK_LINE.captures(line) {
            let label = caps[2].trim();
            let kind = TaskKind::parse_label(label).unwrap_or_else(|| {
                plan.warnings.push(format!("unknown task kind '{}', treated as general", label));
                TaskKind::General
            });
            (kind, caps[3].trim().to_string())
        } else if let Some(caps) = NUMBERED_LINE.captures(line) {
            let description = caps[2].trim();
            plan.warnings
                .push(format!("task line without kind, treated as general: {}", description));
            (TaskKind::General, description.to_string())
        } else {
            continue;
        };

        if description.is_empty() {
            continue;
        }
        let id = format!("task-{}", plan.tasks.len() + 1);
        plan.tasks.push(Task::new(id, kind, description));
    }

    if plan.tasks.is_empty() {
        plan.warnings.push(
            "decomposition produced no tasks; running the request as one general task".to_string(),
        );
        plan.tasks.push(Task::new("task-1", TaskKind::General, request.trim()));
    }
    plan
}

/// Drop list bullets and bold markers models like to add
fn strip_markdown(line: &str) -> &str {
    let line = line.trim();
    let line = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")).unwrap_or(line);
    line.trim_matches('*').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_well_formed_lines() {
        let reply = "1. [flight] 查询上海到北京的机票\n\
                     2、[酒店] 搜索北京酒店三晚\n\
                     3) [ROUTE] 规划三日游路线\n\
                     4. [budget] 核对预算5000";
        let plan = parse_tasks(reply, "ignored");

        let kinds: Vec<TaskKind> = plan.tasks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TaskKind::Flight, TaskKind::Hotel, TaskKind::Route, TaskKind::Budget]
        );
        assert_eq!(plan.tasks[1].description, "搜索北京酒店三晚");
        assert_eq!(plan.tasks[1].assigned_worker, "hotel");
        assert_eq!(plan.tasks[3].id, "task-4");
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_unknown_kind_and_missing_bracket_become_general() {
        let reply = "1. [visa] 办理签证\n2. 看看天气";
        let plan = parse_tasks(reply, "ignored");

        assert_eq!(plan.tasks.len(), 2);
        assert!(plan
            .tasks
            .iter()
            .all(|t| t.kind == TaskKind::General && t.assigned_worker == "general"));
        assert_eq!(plan.tasks[0].description, "办理签证");
        assert_eq!(plan.tasks[1].description, "看看天气");
        assert_eq!(plan.warnings.len(), 2);
    }

    #[test]
    fn test_chatter_is_ignored() {
        let reply = "Sure! Here is the plan:\n\n- **1. [hotel] Find a hotel**\n\
                     Let me know if you need more.";
        let plan = parse_tasks(reply, "ignored");

        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].kind, TaskKind::Hotel);
        assert_eq!(plan.tasks[0].description, "Find a hotel");
    }

    #[test]
    fn test_nothing_parses_falls_back_to_request() {
        let plan = parse_tasks("I can help with that!", " 帮我规划北京三天游 ");

        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].kind, TaskKind::General);
        assert_eq!(plan.tasks[0].description, "帮我规划北京三天游");
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn test_every_task_has_kind_and_worker() {
        let reply = "1. [flight] a\n2. [hotel] b\nnoise\n3. c\n4. [unknown] d\n5. [预算] e";
        let plan = parse_tasks(reply, "r");
        for task in &plan.tasks {
            assert_eq!(task.assigned_worker, task.kind.worker_id());
            assert!(!task.description.is_empty());
        }
        assert_eq!(plan.tasks.len(), 5);
    }
}
