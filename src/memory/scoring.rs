//! Importance and retention scoring for working-memory messages

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::core::{Message, Role};

pub(crate) const ACTION_WORDS: &[&str] = &[
    "预订", "预定", "订", "搜索", "查询", "查找", "规划", "安排", "book", "reserve", "search",
    "find", "plan", "schedule",
];

pub(crate) const PREFERENCE_WORDS: &[&str] = &[
    "喜欢", "偏好", "想要", "希望", "不要", "讨厌", "prefer", "like", "want", "love", "hate",
    "avoid",
];

pub(crate) const IMPORTANCE_WORDS: &[&str] = &[
    "重要", "必须", "一定", "务必", "预算", "important", "must", "budget", "required", "essential",
];

const BASE_IMPORTANCE: f64 = 0.5;
const ACTION_BONUS: f64 = 0.1;
const PREFERENCE_BONUS: f64 = 0.15;
const IMPORTANCE_BONUS: f64 = 0.2;
const MAX_LENGTH_BONUS: f64 = 0.2;

const IMPORTANCE_WEIGHT: f64 = 0.7;
const DECAY_WEIGHT: f64 = 0.3;

fn role_bonus(role: Role) -> f64 {
    match role {
        Role::System => 0.3,
        Role::User => 0.2,
        Role::Assistant => 0.1,
        Role::Tool => 0.0,
    }
}

pub(crate) fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Importance in [0, 1], computed once when a message enters memory
pub fn score_importance(message: &Message) -> f64 {
    let text = message.content.to_lowercase();
    let mut score = BASE_IMPORTANCE + role_bonus(message.role);

    if contains_any(&text, ACTION_WORDS) {
        score += ACTION_BONUS;
    }
    if contains_any(&text, PREFERENCE_WORDS) {
        score += PREFERENCE_BONUS;
    }
    if contains_any(&text, IMPORTANCE_WORDS) {
        score += IMPORTANCE_BONUS;
    }

    let chars = message.content.chars().count() as f64;
    score += (chars / 1000.0).min(MAX_LENGTH_BONUS);

    score.clamp(0.0, 1.0)
}

/// `importance*0.7 + decay*0.3`, where decay falls linearly to zero at `max_age`
pub fn retention_score(
    importance: f64,
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    max_age: Duration,
) -> f64 {
    let age = (now - timestamp).to_std().unwrap_or(Duration::ZERO);
    let decay = if max_age.is_zero() {
        0.0
    } else {
        (1.0 - age.as_secs_f64() / max_age.as_secs_f64()).max(0.0)
    };
    importance * IMPORTANCE_WEIGHT + decay * DECAY_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_weighting() {
        let system = score_importance(&Message::system("x"));
        let user = score_importance(&Message::user("x"));
        let assistant = score_importance(&Message::assistant("x"));
        let tool = score_importance(&Message::tool("c1", "t", "x"));
        assert!(system > user && user > assistant && assistant > tool);
        assert!((tool - 0.501).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_bonuses_and_clamp() {
        let plain = score_importance(&Message::assistant("好的"));
        let action = score_importance(&Message::assistant("我来搜索航班"));
        assert!((action - plain - ACTION_BONUS).abs() < 0.01);

        let loaded = score_importance(&Message::user("帮我预订酒店，我喜欢安静的，预算很重要"));
        assert_eq!(loaded, 1.0);
    }

    #[test]
    fn test_length_bonus_is_capped() {
        let long = score_importance(&Message::tool("c1", "t", "a".repeat(5000)));
        assert!((long - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_retention_decay() {
        let now = Utc::now();
        let day = Duration::from_secs(24 * 3600);

        let fresh = retention_score(0.5, now, now, day);
        assert!((fresh - 0.65).abs() < 1e-9);

        let half = retention_score(0.5, now - chrono::Duration::hours(12), now, day);
        assert!((half - 0.5).abs() < 1e-6);

        let stale = retention_score(0.5, now - chrono::Duration::hours(48), now, day);
        assert!((stale - 0.35).abs() < 1e-9);
    }
}
