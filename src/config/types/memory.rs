//! Working-memory configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits that drive compaction and pruning of an agent's working memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Hard cap on stored messages; above it the lowest-retention 20% is dropped
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Non-system message count that triggers summarization of the oldest half
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: usize,
    /// Age at which a message's time-decay term reaches zero
    #[serde(with = "humantime_serde", default = "default_max_age")]
    pub max_age: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            max_messages: default_max_messages(),
            summarize_threshold: default_summarize_threshold(),
            max_age: default_max_age(),
        }
    }
}

fn default_max_messages() -> usize {
    100
}

fn default_summarize_threshold() -> usize {
    20
}

fn default_max_age() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}
