//! Long-lived user profile learned from user messages
//!
//! Preferences and facts outlive `WorkingMemory::clear()`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const PREFERENCE_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "accommodation",
        &[
            "民宿", "五星", "经济型", "青旅", "快捷酒店", "度假村", "hostel", "resort", "boutique",
            "airbnb", "luxury",
        ],
    ),
    (
        "transport",
        &[
            "高铁", "动车", "飞机", "自驾", "火车", "地铁", "train", "self-drive", "subway",
            "direct flight",
        ],
    ),
    (
        "food",
        &["辣", "素食", "海鲜", "清淡", "小吃", "vegetarian", "vegan", "seafood", "spicy", "halal"],
    ),
    (
        "pace",
        &[
            "悠闲", "轻松", "紧凑", "慢节奏", "特种兵", "relaxed", "leisurely", "packed",
            "fast-paced",
        ],
    ),
    (
        "travel_style",
        &[
            "亲子", "蜜月", "背包", "自由行", "跟团", "穷游", "family", "honeymoon", "backpack",
            "solo", "adventure",
        ],
    ),
];

/// A place name never starts with a numeral, so "规划三日游" yields nothing
static DESTINATION_ZH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?:目的地是|目的地为|去|到|飞往|前往|规划|游览)",
        r"([\p{Han}&&[^一二三四五六七八九十两几半]][\p{Han}]{1,3}?)",
        r"(?:[一二三四五六七八九十两\d]+[天日]|旅游|旅行|玩|游|出差|看看|的|，|,|。|\s|$)",
    ))
    .expect("destination regex")
});

static DESTINATION_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:to|visit|visiting|in)\s+([A-Z][a-z]+(?:\s[A-Z][a-z]+)?)")
        .expect("destination regex")
});

static BUDGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:预算|budget)[^\d]{0,8}(\d+(?:\.\d+)?)\s*(万|千|k)?").expect("budget regex")
});

/// Preferences and facts extracted from user-authored text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Category → matched keyword
    pub preferences: BTreeMap<String, String>,
    /// `destination` and `budget`
    pub knowledge: BTreeMap<String, String>,
}

impl UserProfile {
    pub fn is_empty(&self) -> bool {
        self.preferences.is_empty() && self.knowledge.is_empty()
    }

    /// Learn from one user message. Later mentions overwrite earlier ones.
    pub fn learn(&mut self, text: &str) {
        let lowered = text.to_lowercase();
        for (category, words) in PREFERENCE_CATEGORIES {
            if let Some(word) = words.iter().find(|w| lowered.contains(*w)) {
                self.preferences.insert(category.to_string(), word.to_string());
            }
        }

        if let Some(destination) = extract_destination(text) {
            self.knowledge.insert("destination".to_string(), destination);
        }
        if let Some(budget) = extract_budget(text) {
            self.knowledge.insert("budget".to_string(), budget);
        }
    }

    /// Rendered as `key: value` pairs separated by `; `
    pub fn render(&self) -> String {
        self.preferences
            .iter()
            .chain(self.knowledge.iter())
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn extract_destination(text: &str) -> Option<String> {
    DESTINATION_ZH
        .captures(text)
        .or_else(|| DESTINATION_EN.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn extract_budget(text: &str) -> Option<String> {
    let caps = BUDGET.captures(text)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        Some(unit) if unit == "万" => 10_000.0,
        Some(unit) if unit == "千" || unit == "k" => 1_000.0,
        _ => 1.0,
    };
    let total = amount * multiplier;
    Some(if total.fract() == 0.0 {
        format!("{}", total as i64)
    } else {
        format!("{}", total)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learns_destination_and_budget() {
        let mut profile = UserProfile::default();
        profile.learn("帮我规划北京三天游，预算5000");
        assert_eq!(profile.knowledge.get("destination").map(String::as_str), Some("北京"));
        assert_eq!(profile.knowledge.get("budget").map(String::as_str), Some("5000"));
    }

    #[test]
    fn test_day_count_is_not_a_destination() {
        assert_eq!(extract_destination("帮我规划三日游，目的地是成都").as_deref(), Some("成都"));
        assert_eq!(extract_destination("规划两天的行程"), None);
        assert_eq!(extract_destination("想去杭州玩两天").as_deref(), Some("杭州"));
    }

    #[test]
    fn test_budget_units() {
        assert_eq!(extract_budget("预算1.5万左右").as_deref(), Some("15000"));
        assert_eq!(extract_budget("my budget is 3k").as_deref(), Some("3000"));
        assert_eq!(extract_budget("no numbers here"), None);
    }

    #[test]
    fn test_english_destination() {
        let mut profile = UserProfile::default();
        profile.learn("I want a relaxed trip to Kyoto with my family");
        assert_eq!(profile.knowledge.get("destination").map(String::as_str), Some("Kyoto"));
        assert_eq!(profile.preferences.get("pace").map(String::as_str), Some("relaxed"));
        assert_eq!(profile.preferences.get("travel_style").map(String::as_str), Some("family"));
    }

    #[test]
    fn test_preferences_overwrite_and_render() {
        let mut profile = UserProfile::default();
        profile.learn("想住民宿");
        profile.learn("还是住五星吧");
        assert_eq!(profile.preferences.get("accommodation").map(String::as_str), Some("五星"));
        assert_eq!(profile.render(), "accommodation: 五星");
    }
}
