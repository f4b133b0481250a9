//! Shared error and denial taxonomy.
//!
//! Denials are values, not panics: the gateway hands a [`Denial`] back to the
//! requesting executor, which may recover locally (skip the capability, ask
//! another agent) instead of failing its phase.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a request or piece of content was refused.
///
/// The reason string rendered into audit records uses the kebab-case form
/// (`not-permitted`, `rate-limited`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    /// Capability absent from the requesting agent's allowlist.
    NotPermitted,
    /// Content scan matched a policy detector.
    PolicyViolation,
    /// Sliding-window rate limit exceeded for (agent, capability).
    RateLimited,
    /// Agent's risk score crossed the ceiling and it has not been unblocked.
    AgentBlocked,
    /// No result within the configured gateway deadline.
    Timeout,
    /// Tool response failed the outbound content scan.
    ResponseViolation,
}

impl DenyReason {
    /// Kebab-case label used in audit detail strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NotPermitted => "not-permitted",
            DenyReason::PolicyViolation => "policy-violation",
            DenyReason::RateLimited => "rate-limited",
            DenyReason::AgentBlocked => "agent-blocked",
            DenyReason::Timeout => "timeout",
            DenyReason::ResponseViolation => "response-violation",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A refused request, recoverable by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub reason: DenyReason,
    pub detail: String,
}

impl Denial {
    pub fn new(reason: DenyReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "denied ({}): {}", self.reason, self.detail)
    }
}

/// Result type for security operations
pub type SecurityResult<T> = Result<T, SecurityError>;

/// Errors raised by the security layer itself (as opposed to denials it
/// hands out).
#[derive(Error, Debug)]
pub enum SecurityError {
    /// A custom detector pattern failed to compile
    #[error("Invalid detector pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    /// Configuration rejected at construction time
    #[error("Invalid guardrail configuration: {0}")]
    InvalidConfig(String),
}
