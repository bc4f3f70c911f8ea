//! Cost extraction from worker output

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::{SharedContext, TaskKind};

/// Context key prefix for extracted costs
pub const COST_KEY_PREFIX: &str = "extracted_";

static PREFIXED_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:¥|￥|\$|\bRMB|\bCNY|\bUSD)\s*(\d[\d,]*(?:\.\d+)?)")
        .expect("prefixed amount regex")
});

static SUFFIXED_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(?:元|RMB\b|CNY\b|USD\b)")
        .expect("suffixed amount regex")
});

/// Words that mark an amount as a total rather than a unit price
const TOTAL_MARKERS: &[&str] = &["共", "总计", "总价", "总费用", "合计", "total"];

/// A total marker must sit in the same clause, at most this many chars before the amount
const MARKER_WINDOW_CHARS: usize = 8;

const CLAUSE_BREAKS: &[char] = &['，', ',', '；', ';', '。', '\n'];

struct Amount {
    value: f64,
    total: bool,
}

fn amounts(text: &str) -> impl Iterator<Item = Amount> + '_ {
    PREFIXED_AMOUNT
        .captures_iter(text)
        .chain(SUFFIXED_AMOUNT.captures_iter(text))
        .filter_map(move |caps| {
            let start = caps.get(0)?.start();
            let value = caps[1].replace(',', "").parse::<f64>().ok()?;
            Some(Amount {
                value,
                total: marked_as_total(&text[..start]),
            })
        })
}

fn marked_as_total(preceding: &str) -> bool {
    let clause = preceding.rsplit(CLAUSE_BREAKS).next().unwrap_or(preceding);
    let mut window: Vec<char> = clause.chars().rev().take(MARKER_WINDOW_CHARS).collect();
    window.reverse();
    let window = window.into_iter().collect::<String>().to_lowercase();
    TOTAL_MARKERS.iter().any(|marker| window.contains(marker))
}

/// The cost a text quotes: the lowest amount marked as a total (共, 合计,
/// total, ...) if there is one, otherwise the lowest currency-marked amount
pub fn extract_cost(text: &str) -> Option<f64> {
    let (totals, others): (Vec<Amount>, Vec<Amount>) = amounts(text).partition(|a| a.total);
    let pool = if totals.is_empty() { others } else { totals };
    pool.into_iter().map(|a| a.value).reduce(f64::min)
}

/// Cost of a finished task. The worker's answer wins; the tool results it
/// saw during the task are used only when the answer quotes no amount.
pub fn extract_task_cost(output: &str, tool_results: &[String]) -> Option<f64> {
    extract_cost(output).or_else(|| {
        tool_results
            .iter()
            .filter_map(|result| extract_cost(result))
            .reduce(f64::min)
    })
}

/// `extracted_<kind>_cost`
pub fn cost_key(kind: TaskKind) -> String {
    format!("{}{}_cost", COST_KEY_PREFIX, kind)
}

/// Every `extracted_*_cost` figure in the context, in key order
pub fn extracted_costs(context: &SharedContext) -> Vec<(String, f64)> {
    context
        .with_prefix(COST_KEY_PREFIX)
        .filter(|(key, _)| key.ends_with("_cost"))
        .filter_map(|(key, value)| value.as_f64().map(|v| (key.clone(), v)))
        .collect()
}

/// Append the known cost figures to a budget task description
pub fn enrich_with_costs(description: &str, context: &SharedContext) -> String {
    let costs = extracted_costs(context);
    if costs.is_empty() {
        return description.to_string();
    }
    let lines: Vec<String> = costs
        .iter()
        .map(|(key, value)| format!("- {}: {}", key, value))
        .collect();
    format!("{}\n\nKnown costs:\n{}", description, lines.join("\n"))
}
