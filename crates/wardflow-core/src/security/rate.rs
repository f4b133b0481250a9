//! Sliding-window rate limiting per (agent, capability) pair.

use crate::identifiers::{AgentId, CapabilityName};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// The window already holds `requests` hits against the limit.
    Denied { requests: u32 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

/// Sliding-window counter keyed by (agent, capability).
///
/// Each key tracks the timestamps of recent hits; entries outside the
/// window are dropped on every check, so the counter never needs a
/// background sweeper.
pub struct SlidingWindowRateLimiter {
    limit: u32,
    window: Duration,
    hits: Mutex<HashMap<(AgentId, CapabilityName), Vec<Instant>>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Check and record one hit for the pair.
    ///
    /// An allowed check consumes one slot in the window; a denied check
    /// does not (the request never proceeds).
    pub fn check(&self, agent: &AgentId, capability: &CapabilityName) -> RateDecision {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        let entry = hits
            .entry((agent.clone(), capability.clone()))
            .or_default();
        entry.retain(|&t| now.duration_since(t) < self.window);

        if entry.len() >= self.limit as usize {
            return RateDecision::Denied {
                requests: entry.len() as u32,
            };
        }

        entry.push(now);
        RateDecision::Allowed
    }

    /// Drop empty windows to bound memory on long runs.
    pub fn cleanup_stale_entries(&self) {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        hits.retain(|_, entry| {
            entry.retain(|&t| now.duration_since(t) < self.window);
            !entry.is_empty()
        });
    }
}
