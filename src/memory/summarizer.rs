//! Conversation summarizer for working-memory compaction
//!
//! Condenses a run of messages into a `ConversationSummary` with keyword
//! heuristics: topics, decisions and stated preferences. No model call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::scoring::{contains_any, PREFERENCE_WORDS};
use super::working::ScoredMessage;
use crate::core::Role;

const TOPICS: &[(&str, &[&str])] = &[
    ("flight", &["航班", "机票", "flight", "airline"]),
    ("hotel", &["酒店", "住宿", "民宿", "hotel", "accommodation"]),
    ("route", &["路线", "交通", "地铁", "route", "transit", "directions"]),
    ("budget", &["预算", "费用", "花费", "budget", "cost", "price"]),
    ("attractions", &["景点", "博物馆", "故宫", "attraction", "museum", "sightseeing"]),
    ("food", &["美食", "餐厅", "小吃", "food", "restaurant", "dining"]),
    ("weather", &["天气", "气温", "weather", "forecast"]),
];

const DECISION_WORDS: &[&str] = &[
    "决定", "选择", "确定", "就订", "就选", "定了", "decide", "decided", "choose", "chose",
    "go with", "booked", "confirm",
];

const MAX_EXCERPT_CHARS: usize = 80;
const MAX_ITEMS: usize = 5;

/// Condensed record of compacted messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Human-readable summary line
    pub text: String,
    pub topics: Vec<String>,
    pub decisions: Vec<String>,
    pub preferences: Vec<String>,
    /// Highest importance among the condensed messages
    pub importance: f64,
    pub message_count: usize,
}

/// Summarize `messages` into one summary
pub fn summarize(messages: &[ScoredMessage]) -> ConversationSummary {
    let mut topics: Vec<String> = Vec::new();
    let mut decisions: Vec<String> = Vec::new();
    let mut preferences: Vec<String> = Vec::new();

    for scored in messages {
        let lowered = scored.message.content.to_lowercase();

        for (topic, words) in TOPICS {
            if contains_any(&lowered, words) && !topics.iter().any(|t| t == topic) {
                topics.push(topic.to_string());
            }
        }

        if scored.message.role == Role::Tool {
            continue;
        }
        for sentence in sentences(&scored.message.content) {
            let lowered = sentence.to_lowercase();
            if decisions.len() < MAX_ITEMS && contains_any(&lowered, DECISION_WORDS) {
                push_unique(&mut decisions, excerpt(sentence));
            }
            if scored.message.role == Role::User
                && preferences.len() < MAX_ITEMS
                && contains_any(&lowered, PREFERENCE_WORDS)
            {
                push_unique(&mut preferences, excerpt(sentence));
            }
        }
    }

    let importance = messages.iter().map(|m| m.importance).fold(0.0_f64, f64::max);
    let timestamp = messages.last().map(|m| m.message.timestamp).unwrap_or_else(Utc::now);

    let mut text = format!("{} earlier messages", messages.len());
    if !topics.is_empty() {
        text.push_str(&format!("; topics: {}", topics.join(", ")));
    }
    if !decisions.is_empty() {
        text.push_str(&format!("; decisions: {}", decisions.join(" / ")));
    }
    if !preferences.is_empty() {
        text.push_str(&format!("; preferences: {}", preferences.join(" / ")));
    }

    debug!(
        messages = messages.len(),
        topics = topics.len(),
        decisions = decisions.len(),
        preferences = preferences.len(),
        "Conversation summarized"
    );

    ConversationSummary {
        id: Uuid::new_v4(),
        timestamp,
        text,
        topics,
        decisions,
        preferences,
        importance,
        message_count: messages.len(),
    }
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['。', '！', '？', '\n', '.', '!', '?', '；', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn excerpt(sentence: &str) -> String {
    if sentence.chars().count() > MAX_EXCERPT_CHARS {
        let cut: String = sentence.chars().take(MAX_EXCERPT_CHARS).collect();
        format!("{}...", cut)
    } else {
        sentence.to_string()
    }
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}
