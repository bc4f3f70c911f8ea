//! Per-agent working memory
//!
//! Holds the scored message stream, compaction summaries and the learned
//! user profile. Compaction runs on insertion once the non-system count
//! reaches the summarize threshold; the hard cap prunes by retention score.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::knowledge::UserProfile;
use super::scoring::{retention_score, score_importance};
use super::summarizer::{summarize, ConversationSummary};
use crate::config::MemoryConfig;
use crate::core::{Message, MessageMetadata, Role};

/// Fraction of messages kept when the hard cap is exceeded
const CAP_RETAIN_RATIO: f64 = 0.8;

/// Summaries at or below this importance are dropped by `clear()`
const CLEAR_KEEP_IMPORTANCE: f64 = 0.7;

/// A message with the importance assigned when it entered memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMessage {
    pub message: Message,
    pub importance: f64,
}

/// Bounded conversation memory owned by one agent
#[derive(Debug, Clone)]
pub struct WorkingMemory {
    config: MemoryConfig,
    messages: Vec<ScoredMessage>,
    summaries: Vec<ConversationSummary>,
    profile: UserProfile,
}

impl WorkingMemory {
    pub fn new(config: MemoryConfig) -> Self {
        WorkingMemory {
            config,
            messages: Vec::new(),
            summaries: Vec::new(),
            profile: UserProfile::default(),
        }
    }

    /// Score and store a message, then compact or prune if a bound is hit.
    /// User messages also feed the learned profile.
    pub fn add_message(&mut self, message: Message) {
        if message.role == Role::User {
            self.profile.learn(&message.content);
        }
        self.add_generated(message);
    }

    /// Store a message without learning from it. Used for user-role prompts
    /// that were written by the orchestrator rather than the user.
    pub fn add_generated(&mut self, message: Message) {
        let importance = score_importance(&message);
        self.messages.push(ScoredMessage { message, importance });

        if self.non_system_count() >= self.config.summarize_threshold {
            self.compact();
        }
        if self.messages.len() > self.config.max_messages {
            self.enforce_cap(Utc::now());
        }
    }

    /// Condense the oldest half of the non-system messages into a summary.
    ///
    /// Returns false, changing nothing, below the summarize threshold.
    pub fn compact(&mut self) -> bool {
        let non_system = self.non_system_count();
        if non_system < self.config.summarize_threshold || non_system < 2 {
            return false;
        }

        let take = non_system / 2;
        let mut condensed = Vec::with_capacity(take);
        let mut kept = Vec::with_capacity(self.messages.len() - take);
        for scored in self.messages.drain(..) {
            if condensed.len() < take && !scored.message.is_system() {
                condensed.push(scored);
            } else {
                kept.push(scored);
            }
        }
        self.messages = kept;

        let summary = summarize(&condensed);
        info!(
            condensed = summary.message_count,
            remaining = self.messages.len(),
            topics = ?summary.topics,
            "Working memory compacted"
        );
        self.summaries.push(summary);
        true
    }

    /// Keep the top share by retention score, always keeping system messages
    fn enforce_cap(&mut self, now: DateTime<Utc>) {
        let total = self.messages.len();
        let system = self.messages.iter().filter(|m| m.message.is_system()).count();
        let keep_total = ((total as f64) * CAP_RETAIN_RATIO).floor() as usize;
        let keep_other = keep_total.saturating_sub(system);

        let mut ranked: Vec<(usize, f64)> = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.message.is_system())
            .map(|(i, m)| (i, self.retention(m, now)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let survivors: HashSet<usize> =
            ranked.into_iter().take(keep_other).map(|(i, _)| i).collect();

        let before = self.messages.len();
        let mut index = 0;
        self.messages.retain(|m| {
            let keep = m.message.is_system() || survivors.contains(&index);
            index += 1;
            keep
        });
        debug!(before, after = self.messages.len(), "Working memory pruned to cap");
    }

    /// Feed user-authored text to the preference and knowledge stores
    pub fn learn_from_user(&mut self, text: &str) {
        self.profile.learn(text);
    }

    /// Partial reset: keeps system messages, high-importance summaries and the learned profile
    pub fn clear(&mut self) {
        self.messages.retain(|m| m.message.is_system());
        self.summaries.retain(|s| s.importance > CLEAR_KEEP_IMPORTANCE);
    }

    /// Gateway-ready message window.
    ///
    /// System messages first, then one system message carrying summaries and
    /// the learned profile, then the conversation. Tool messages whose
    /// declaring assistant turn is gone are skipped, and assistant turns only
    /// declare the calls that are still answered.
    pub fn context_messages(&self) -> Vec<Message> {
        let mut window: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.message.is_system())
            .map(|m| m.message.clone())
            .collect();

        if let Some(recap) = self.recap() {
            window.push(Message::system(recap));
        }

        let conversation: Vec<&Message> = self
            .messages
            .iter()
            .map(|m| &m.message)
            .filter(|m| !m.is_system())
            .collect();

        let mut open_calls: HashSet<&str> = HashSet::new();
        for (i, &message) in conversation.iter().enumerate() {
            match message.role {
                Role::Tool => {
                    if message.tool_call_id().is_some_and(|id| open_calls.remove(id)) {
                        window.push(message.clone());
                    }
                }
                Role::Assistant if !message.tool_calls().is_empty() => {
                    let answered: HashSet<&str> = conversation[i + 1..]
                        .iter()
                        .take_while(|m| m.role == Role::Tool)
                        .filter_map(|m| m.tool_call_id())
                        .collect();
                    open_calls = message
                        .tool_calls()
                        .iter()
                        .map(|c| c.id.as_str())
                        .filter(|id| answered.contains(id))
                        .collect();

                    let calls: Vec<_> = message
                        .tool_calls()
                        .iter()
                        .filter(|c| open_calls.contains(c.id.as_str()))
                        .cloned()
                        .collect();
                    if calls.is_empty() && message.content.is_empty() {
                        continue;
                    }
                    let mut trimmed = message.clone();
                    trimmed.metadata = if calls.is_empty() {
                        None
                    } else {
                        Some(MessageMetadata::ToolCalls { calls })
                    };
                    window.push(trimmed);
                }
                _ => {
                    open_calls.clear();
                    window.push(message.clone());
                }
            }
        }

        window
    }

    fn recap(&self) -> Option<String> {
        if self.summaries.is_empty() && self.profile.is_empty() {
            return None;
        }
        let mut lines = Vec::new();
        if !self.summaries.is_empty() {
            lines.push("Earlier conversation:".to_string());
            lines.extend(self.summaries.iter().map(|s| format!("- {}", s.text)));
        }
        if !self.profile.is_empty() {
            lines.push(format!("Known about the user: {}", self.profile.render()));
        }
        Some(lines.join("\n"))
    }

    /// Plain-text rendering of the memory for prompts and diagnostics
    pub fn get_context(&self) -> String {
        let mut parts = Vec::new();
        if let Some(recap) = self.recap() {
            parts.push(recap);
        }
        parts.extend(
            self.messages
                .iter()
                .filter(|m| !m.message.is_system())
                .map(|m| format!("{}: {}", m.message.role, m.message.content)),
        );
        parts.join("\n")
    }

    /// The `limit` messages with the highest retention score, best first
    pub fn recall(&self, limit: usize) -> Vec<&ScoredMessage> {
        self.recall_at(limit, Utc::now())
    }

    fn retention(&self, scored: &ScoredMessage, now: DateTime<Utc>) -> f64 {
        let timestamp = scored.message.timestamp;
        retention_score(scored.importance, timestamp, now, self.config.max_age)
    }

    fn recall_at(&self, limit: usize, now: DateTime<Utc>) -> Vec<&ScoredMessage> {
        let mut ranked: Vec<(&ScoredMessage, f64)> = self
            .messages
            .iter()
            .map(|m| (m, self.retention(m, now)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.into_iter().take(limit).map(|(m, _)| m).collect()
    }

    pub fn messages(&self) -> &[ScoredMessage] {
        &self.messages
    }

    pub fn summaries(&self) -> &[ConversationSummary] {
        &self.summaries
    }

    pub fn preferences(&self) -> &std::collections::BTreeMap<String, String> {
        &self.profile.preferences
    }

    pub fn knowledge(&self) -> &std::collections::BTreeMap<String, String> {
        &self.profile.knowledge
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn non_system_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.message.is_system()).count()
    }
}

impl Default for WorkingMemory {
    fn default() -> Self {
        WorkingMemory::new(MemoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ToolArgs, ToolCall};
    use std::time::Duration;

    fn memory(threshold: usize, max_messages: usize) -> WorkingMemory {
        WorkingMemory::new(MemoryConfig {
            max_messages,
            summarize_threshold: threshold,
            max_age: Duration::from_secs(24 * 3600),
        })
    }

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "search_flights", ToolArgs::new())
    }

    #[test]
    fn test_compaction_condenses_oldest_half() {
        let mut mem = memory(4, 100);
        mem.add_message(Message::system("You are a travel agent"));
        mem.add_message(Message::user("第一条"));
        mem.add_message(Message::assistant("第二条"));
        mem.add_message(Message::user("第三条"));
        assert!(mem.summaries().is_empty());

        mem.add_message(Message::assistant("第四条"));

        assert_eq!(mem.summaries().len(), 1);
        assert_eq!(mem.summaries()[0].message_count, 2);
        let contents: Vec<&str> =
            mem.messages().iter().map(|m| m.message.content.as_str()).collect();
        assert_eq!(contents, vec!["You are a travel agent", "第三条", "第四条"]);
    }

    #[test]
    fn test_compact_below_threshold_is_noop() {
        let mut mem = memory(20, 100);
        mem.add_message(Message::user("hello"));
        mem.add_message(Message::assistant("hi"));

        let before: Vec<ScoredMessage> = mem.messages().to_vec();
        assert!(!mem.compact());
        assert!(!mem.compact());
        assert_eq!(mem.messages(), before.as_slice());
        assert!(mem.summaries().is_empty());
    }

    #[test]
    fn test_hard_cap_keeps_system_and_order() {
        let mut mem = memory(1000, 10);
        mem.add_message(Message::system("sys"));
        for i in 0..10 {
            mem.add_message(Message::tool("c", "t", format!("filler {}", i)));
        }
        // 11 messages > 10: keep floor(11 * 0.8) = 8
        assert_eq!(mem.len(), 8);
        assert!(mem.messages()[0].message.is_system());

        let stamps: Vec<_> = mem.messages().iter().map(|m| m.message.timestamp).collect();
        let mut sorted = stamps.clone();
        sorted.sort();
        assert_eq!(stamps, sorted);
    }

    #[test]
    fn test_hard_cap_prefers_important_messages() {
        let mut mem = memory(1000, 4);
        let old = Utc::now() - chrono::Duration::hours(30);
        mem.add_message(Message::tool("c", "t", "noise").at(old));
        mem.add_message(Message::user("我的预算很重要，必须控制在5000以内").at(old));
        mem.add_message(Message::tool("c", "t", "noise").at(old));
        mem.add_message(Message::tool("c", "t", "noise").at(old));
        mem.add_message(Message::tool("c", "t", "noise").at(old));

        assert_eq!(mem.len(), 4);
        assert!(mem.messages().iter().any(|m| m.message.role == Role::User));
    }

    #[test]
    fn test_clear_keeps_system_and_important_summaries() {
        let mut mem = memory(2, 100);
        mem.add_message(Message::system("sys"));
        mem.add_message(Message::user("帮我规划北京三天游，预算5000，这很重要"));
        mem.add_message(Message::assistant("好的"));
        assert_eq!(mem.summaries().len(), 1);
        assert!(mem.summaries()[0].importance > 0.7);

        mem.add_message(Message::tool("c", "t", "x"));
        assert_eq!(mem.summaries().len(), 2);
        assert!(mem.summaries()[1].importance <= 0.7);

        mem.clear();

        assert_eq!(mem.len(), 1);
        assert!(mem.messages()[0].message.is_system());
        assert_eq!(mem.summaries().len(), 1);
        assert_eq!(mem.knowledge().get("destination").map(String::as_str), Some("北京"));
        assert_eq!(mem.knowledge().get("budget").map(String::as_str), Some("5000"));
    }

    #[test]
    fn test_generated_prompts_are_not_learned() {
        let mut mem = memory(100, 100);
        mem.add_generated(Message::user("Example: 查询上海到北京的往返机票，住民宿"));
        assert!(mem.knowledge().is_empty());
        assert!(mem.preferences().is_empty());

        mem.learn_from_user("Plan a 3-day trip to Kyoto");
        assert_eq!(mem.knowledge().get("destination").map(String::as_str), Some("Kyoto"));
        assert_eq!(mem.len(), 1);
    }

    #[test]
    fn test_context_window_layout() {
        let mut mem = memory(100, 100);
        mem.add_message(Message::system("sys"));
        mem.add_message(Message::user("我喜欢住民宿"));
        mem.add_message(Message::assistant("好的"));

        let window = mem.context_messages();
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].content, "sys");
        assert!(window[1].is_system());
        assert!(window[1].content.contains("accommodation: 民宿"));
        assert_eq!(window[2].role, Role::User);
        assert!(crate::gateway::validate_message_order(&window).is_ok());
    }

    #[test]
    fn test_context_window_drops_orphaned_tool_messages() {
        let mut mem = memory(4, 100);
        mem.add_message(Message::user("查航班"));
        mem.add_message(Message::assistant_with_tool_calls("", vec![call("c1")]));
        mem.add_message(Message::tool("c1", "search_flights", "CA1501"));
        // reaching 4 condenses the user turn and the declaring assistant turn
        mem.add_message(Message::assistant("找到了CA1501"));

        assert_eq!(mem.summaries().len(), 1);
        let window = mem.context_messages();
        assert!(window.iter().all(|m| m.role != Role::Tool));
        assert!(crate::gateway::validate_message_order(&window).is_ok());
    }

    #[test]
    fn test_context_window_trims_unanswered_calls() {
        let mut mem = memory(100, 100);
        mem.add_message(Message::user("查航班和酒店"));
        mem.add_message(Message::assistant_with_tool_calls("", vec![call("c1"), call("c2")]));
        mem.add_message(Message::tool("c1", "search_flights", "CA1501"));

        let window = mem.context_messages();
        let assistant = window.iter().find(|m| m.role == Role::Assistant).unwrap();
        assert_eq!(assistant.tool_calls().len(), 1);
        assert_eq!(assistant.tool_calls()[0].id, "c1");
        assert!(crate::gateway::validate_message_order(&window).is_ok());
    }

    #[test]
    fn test_recall_orders_by_retention() {
        let mut mem = memory(100, 100);
        let now = Utc::now();
        mem.add_message(Message::tool("c", "t", "old noise").at(now - chrono::Duration::hours(20)));
        mem.add_message(Message::user("必须订到直飞航班").at(now));

        let recalled = mem.recall_at(1, now);
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].message.role, Role::User);
        assert!(mem.get_context().contains("user: 必须订到直飞航班"));
    }
}
