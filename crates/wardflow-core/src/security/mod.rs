//! Security guardrail: content scanning, risk scoring, rate limiting,
//! and agent blocking.
//!
//! Every external capability call and every bus message passes through this
//! layer before it can have a side effect. Verdicts are immutable values;
//! per-agent counters live behind a per-agent serialization discipline, not
//! a global lock.

mod detectors;
mod guardrail;
mod rate;

pub use detectors::{ContentScanner, Detector};
pub use guardrail::SecurityGuardrail;
pub use rate::{RateDecision, SlidingWindowRateLimiter};

use serde::{Deserialize, Serialize};

/// Which way content is flowing through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    /// Agent-supplied request content, scanned before the external call.
    Inbound,
    /// Tool-supplied response content, scanned before delivery to the agent.
    Outbound,
}

impl std::fmt::Display for ScanDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanDirection::Inbound => write!(f, "inbound"),
            ScanDirection::Outbound => write!(f, "outbound"),
        }
    }
}

/// The guardrail's decision for one piece of content or one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    /// Borderline content: the call proceeds but quarantined responses are
    /// summarized rather than delivered raw.
    Quarantine,
}

/// Immutable outcome of one scan or one request check.
///
/// The first matching detector supplies `reason`; `risk_delta` accumulates
/// across every matching detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityVerdict {
    pub decision: Decision,
    pub risk_delta: u32,
    pub matched_rules: Vec<String>,
    pub reason: String,
}

impl SecurityVerdict {
    /// Clean content: allowed, no risk, no matches.
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            risk_delta: 0,
            matched_rules: Vec::new(),
            reason: "clean".to_string(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            risk_delta: 0,
            matched_rules: Vec::new(),
            reason: reason.into(),
        }
    }

    pub fn is_allow(&self) -> bool {
        self.decision == Decision::Allow
    }

    pub fn is_deny(&self) -> bool {
        self.decision == Decision::Deny
    }

    pub fn is_quarantine(&self) -> bool {
        self.decision == Decision::Quarantine
    }
}
