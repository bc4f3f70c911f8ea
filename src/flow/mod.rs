//! Flow module - request orchestration
//!
//! - parser.rs: decomposition reply → typed tasks
//! - extract.rs: currency amounts from worker output
//! - planning.rs: `PlanningFlow`, the dependency-aware orchestrator
//! - dispatch.rs: `RequestDispatcher`, intent → execution path
//! - result.rs: `FlowResult`

pub mod dispatch;
pub mod extract;
pub mod parser;
pub mod planning;
pub mod result;

pub use dispatch::RequestDispatcher;
pub use extract::{cost_key, extract_cost, extract_task_cost};
pub use parser::{parse_tasks, ParsedPlan};
pub use planning::{FlowState, PlanningFlow, PRIMARY_AGENT_ID, SYNTHESIS_AGENT_ID};
pub use result::FlowResult;
