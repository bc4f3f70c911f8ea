//! Shared context passed between workers and merged by the orchestrator

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys with this prefix are worker-local scratch and never merged back
pub const EPHEMERAL_PREFIX: &str = "last_";

/// A dynamically typed context value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Map(BTreeMap<String, ContextValue>),
}

impl ContextValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ContextValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ContextValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ContextValue>> {
        match self {
            ContextValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContextValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextValue::Bool(b) => write!(f, "{}", b),
            ContextValue::Number(n) => write!(f, "{}", n),
            ContextValue::Text(s) => write!(f, "{}", s),
            ContextValue::Map(m) => {
                let parts: Vec<String> = m.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        ContextValue::Text(s.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        ContextValue::Text(s)
    }
}

impl From<f64> for ContextValue {
    fn from(n: f64) -> Self {
        ContextValue::Number(n)
    }
}

impl From<usize> for ContextValue {
    fn from(n: usize) -> Self {
        ContextValue::Number(n as f64)
    }
}

impl From<bool> for ContextValue {
    fn from(b: bool) -> Self {
        ContextValue::Bool(b)
    }
}

impl From<BTreeMap<String, ContextValue>> for ContextValue {
    fn from(m: BTreeMap<String, ContextValue>) -> Self {
        ContextValue::Map(m)
    }
}

/// String-keyed state bag shared across workers in one flow run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedContext {
    entries: BTreeMap<String, ContextValue>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ContextValue::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ContextValue::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ContextValue::as_bool)
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.entries.iter()
    }

    /// Entries whose key starts with `prefix`
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a ContextValue)> + 'a {
        self.entries.iter().filter(move |(k, _)| k.starts_with(prefix))
    }

    /// Merge a worker's context into this one.
    ///
    /// Incoming values overwrite existing keys; ephemeral keys are skipped.
    /// Returns the number of keys written.
    pub fn merge_from(&mut self, other: &SharedContext) -> usize {
        let mut written = 0;
        for (key, value) in other.iter() {
            if key.starts_with(EPHEMERAL_PREFIX) {
                continue;
            }
            self.entries.insert(key.clone(), value.clone());
            written += 1;
        }
        written
    }

    /// One `- key: value` line per entry, truncating long values
    pub fn render(&self, max_value_chars: usize) -> String {
        self.entries
            .iter()
            .map(|(k, v)| {
                let text = v.to_string();
                let shown = if text.chars().count() > max_value_chars {
                    let cut: String = text.chars().take(max_value_chars).collect();
                    format!("{}...", cut)
                } else {
                    text
                };
                format!("- {}: {}", k, shown)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
