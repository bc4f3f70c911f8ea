//! Terminal outcome of a handled request

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one request, whichever path handled it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    pub success: bool,
    pub output: String,
    pub execution_time_seconds: f64,
    pub tasks_completed: usize,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl FlowResult {
    pub fn success(output: impl Into<String>, elapsed: Duration, tasks_completed: usize) -> Self {
        FlowResult {
            success: true,
            output: output.into(),
            execution_time_seconds: elapsed.as_secs_f64(),
            tasks_completed,
            metadata: BTreeMap::new(),
        }
    }

    /// A failed outcome whose output is the failure reason
    pub fn failure(reason: impl Into<String>, elapsed: Duration) -> Self {
        FlowResult {
            success: false,
            output: reason.into(),
            execution_time_seconds: elapsed.as_secs_f64(),
            tasks_completed: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Append degradation warnings under `metadata["warnings"]`
    pub fn with_warnings(mut self, warnings: &[String]) -> Self {
        if warnings.is_empty() {
            return self;
        }
        let entry = self
            .metadata
            .entry("warnings".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = entry {
            list.extend(warnings.iter().cloned().map(Value::String));
        }
        self
    }

    pub fn warnings(&self) -> Vec<&str> {
        match self.metadata.get("warnings") {
            Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}
