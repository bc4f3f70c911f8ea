//! Usage and cost accounting across gateway calls

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

use super::types::Usage;

/// Point-in-time copy of the monitor's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageSnapshot {
    /// Every attempt, including failed and retried ones
    pub requests: u64,
    /// Attempts that returned an error
    pub failures: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Estimated spend in USD
    pub estimated_cost: f64,
    /// Wall time spent waiting on the endpoint
    pub total_latency: Duration,
}

impl UsageSnapshot {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Thread-safe usage monitor shared by every gateway that reports to it
#[derive(Debug)]
pub struct UsageMonitor {
    prompt_price_per_1k: f64,
    completion_price_per_1k: f64,
    inner: Mutex<UsageSnapshot>,
}

impl UsageMonitor {
    pub fn new(prompt_price_per_1k: f64, completion_price_per_1k: f64) -> Self {
        UsageMonitor {
            prompt_price_per_1k,
            completion_price_per_1k,
            inner: Mutex::new(UsageSnapshot::default()),
        }
    }

    /// Cost of a single response's usage
    pub fn cost_of(&self, usage: &Usage) -> f64 {
        f64::from(usage.prompt_tokens) / 1000.0 * self.prompt_price_per_1k
            + f64::from(usage.completion_tokens) / 1000.0 * self.completion_price_per_1k
    }

    /// Record a successful attempt
    pub fn record_success(&self, usage: Option<&Usage>, latency: Duration) {
        let cost = usage.map(|u| self.cost_of(u)).unwrap_or(0.0);
        let mut inner = self.inner.lock();
        inner.requests += 1;
        inner.total_latency += latency;
        if let Some(usage) = usage {
            inner.prompt_tokens += u64::from(usage.prompt_tokens);
            inner.completion_tokens += u64::from(usage.completion_tokens);
        }
        inner.estimated_cost += cost;
    }

    /// Record a failed attempt
    pub fn record_failure(&self, latency: Duration) {
        let mut inner = self.inner.lock();
        inner.requests += 1;
        inner.total_latency += latency;
        inner.failures += 1;
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        *self.inner.lock()
    }

    pub fn reset(&self) {
        *self.inner.lock() = UsageSnapshot::default();
    }
}

impl Default for UsageMonitor {
    fn default() -> Self {
        UsageMonitor::new(0.0, 0.0)
    }
}
