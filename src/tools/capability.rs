//! Keyword-based capability inference for registered tools
//!
//! Only used for discovery (`ToolRegistry::by_capability`). Nothing relies on
//! it for correctness.

use std::collections::BTreeSet;

use crate::core::WorkerCapability;

const KEYWORDS: &[(WorkerCapability, &[&str])] = &[
    (WorkerCapability::FlightSearch, &["flight", "airline", "airport", "航班", "机票"]),
    (WorkerCapability::HotelBooking, &["hotel", "accommodation", "lodging", "酒店", "住宿"]),
    (
        WorkerCapability::RoutePlanning,
        &["route", "direction", "navigation", "transit", "map", "路线", "交通", "导航"],
    ),
    (
        WorkerCapability::BudgetPlanning,
        &["budget", "cost", "price", "expense", "预算", "费用", "价格"],
    ),
    (WorkerCapability::WebSearch, &["search", "lookup", "query", "web", "搜索", "查询"]),
    (WorkerCapability::DataAnalysis, &["analy", "statistic", "calculate", "分析", "统计", "计算"]),
    (
        WorkerCapability::TextGeneration,
        &["generate", "write", "summar", "translate", "生成", "总结"],
    ),
    (WorkerCapability::TravelPlanning, &["travel", "trip", "itinerary", "旅行", "旅游", "行程"]),
];

/// Infer capability tags from a tool's name and description.
///
/// A tool matching no keyword is tagged `General`.
pub fn infer_capabilities(name: &str, description: &str) -> BTreeSet<WorkerCapability> {
    let haystack = format!("{} {}", name, description).to_lowercase();

    let mut found: BTreeSet<WorkerCapability> = KEYWORDS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| haystack.contains(w)))
        .map(|(cap, _)| *cap)
        .collect();

    if found.is_empty() {
        found.insert(WorkerCapability::General);
    }
    found
}
