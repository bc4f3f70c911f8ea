//! Working memory for agents
//!
//! - `working`: the bounded, scored message store with compaction
//! - `scoring`: importance at insertion and retention over time
//! - `summarizer`: heuristic condensation of compacted messages
//! - `knowledge`: preferences and facts learned from user messages

mod knowledge;
mod scoring;
mod summarizer;
mod working;

pub use knowledge::UserProfile;
pub use scoring::{retention_score, score_importance};
pub use summarizer::{summarize, ConversationSummary};
pub use working::{ScoredMessage, WorkingMemory};
