//! Tasks produced by decomposition and the capabilities workers declare

use serde::{Deserialize, Serialize};

/// Kind of work a task represents; doubles as the worker id it is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Flight,
    Hotel,
    Route,
    Budget,
    General,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Flight,
        TaskKind::Hotel,
        TaskKind::Route,
        TaskKind::Budget,
        TaskKind::General,
    ];

    /// Kinds that consume other tasks' results and run after the parallel phase
    pub const DEPENDENT: [TaskKind; 1] = [TaskKind::Budget];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Flight => "flight",
            TaskKind::Hotel => "hotel",
            TaskKind::Route => "route",
            TaskKind::Budget => "budget",
            TaskKind::General => "general",
        }
    }

    /// Worker id a task of this kind is assigned to
    pub fn worker_id(&self) -> &'static str {
        self.as_str()
    }

    /// Capability the assigned worker must declare
    pub fn required_capability(&self) -> WorkerCapability {
        match self {
            TaskKind::Flight => WorkerCapability::FlightSearch,
            TaskKind::Hotel => WorkerCapability::HotelBooking,
            TaskKind::Route => WorkerCapability::RoutePlanning,
            TaskKind::Budget => WorkerCapability::BudgetPlanning,
            TaskKind::General => WorkerCapability::General,
        }
    }

    pub fn is_dependent(&self) -> bool {
        Self::DEPENDENT.contains(self)
    }

    /// Parse a kind label, accepting English names and common Chinese aliases
    pub fn parse_label(label: &str) -> Option<TaskKind> {
        match label.trim().to_lowercase().as_str() {
            "flight" | "flights" | "航班" | "机票" => Some(TaskKind::Flight),
            "hotel" | "hotels" | "酒店" | "住宿" => Some(TaskKind::Hotel),
            "route" | "routes" | "路线" | "交通" => Some(TaskKind::Route),
            "budget" | "预算" => Some(TaskKind::Budget),
            "general" | "通用" => Some(TaskKind::General),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a task within one flow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
}

/// One typed, assignable unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    pub description: String,
    pub assigned_worker: String,
    pub status: TaskStatus,
    pub result: Option<String>,
}

impl Task {
    /// Create a pending task routed to the kind's worker
    pub fn new(id: impl Into<String>, kind: TaskKind, description: impl Into<String>) -> Self {
        Task {
            id: id.into(),
            kind,
            description: description.into(),
            assigned_worker: kind.worker_id().to_string(),
            status: TaskStatus::Pending,
            result: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, TaskStatus::Failed(_))
    }
}

/// Closed set of capability tags a worker or tool can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkerCapability {
    FlightSearch,
    HotelBooking,
    RoutePlanning,
    BudgetPlanning,
    TextGeneration,
    DataAnalysis,
    WebSearch,
    TravelPlanning,
    General,
}

impl WorkerCapability {
    pub const ALL: [WorkerCapability; 9] = [
        WorkerCapability::FlightSearch,
        WorkerCapability::HotelBooking,
        WorkerCapability::RoutePlanning,
        WorkerCapability::BudgetPlanning,
        WorkerCapability::TextGeneration,
        WorkerCapability::DataAnalysis,
        WorkerCapability::WebSearch,
        WorkerCapability::TravelPlanning,
        WorkerCapability::General,
    ];
}

impl std::fmt::Display for WorkerCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerCapability::FlightSearch => "flightSearch",
            WorkerCapability::HotelBooking => "hotelBooking",
            WorkerCapability::RoutePlanning => "routePlanning",
            WorkerCapability::BudgetPlanning => "budgetPlanning",
            WorkerCapability::TextGeneration => "textGeneration",
            WorkerCapability::DataAnalysis => "dataAnalysis",
            WorkerCapability::WebSearch => "webSearch",
            WorkerCapability::TravelPlanning => "travelPlanning",
            WorkerCapability::General => "general",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(TaskKind::parse_label("flight"), Some(TaskKind::Flight));
        assert_eq!(TaskKind::parse_label(" Hotel "), Some(TaskKind::Hotel));
        assert_eq!(TaskKind::parse_label("预算"), Some(TaskKind::Budget));
        assert_eq!(TaskKind::parse_label("机票"), Some(TaskKind::Flight));
        assert_eq!(TaskKind::parse_label("weather"), None);
    }

    #[test]
    fn test_new_task_is_pending_and_routed() {
        let task = Task::new("task-1", TaskKind::Route, "规划路线");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.assigned_worker, "route");
        assert!(task.result.is_none());
    }

    #[test]
    fn test_only_budget_is_dependent() {
        let dependent: Vec<TaskKind> =
            TaskKind::ALL.into_iter().filter(|k| k.is_dependent()).collect();
        assert_eq!(dependent, vec![TaskKind::Budget]);
    }

    #[test]
    fn test_capability_display_matches_serde() {
        for cap in WorkerCapability::ALL {
            let json = serde_json::to_string(&cap).unwrap();
            assert_eq!(json, format!("\"{}\"", cap));
        }
    }
}
