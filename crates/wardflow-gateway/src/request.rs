//! Capability request and invocation outcome types.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use wardflow_core::{AgentId, CapabilityName, CorrelationId, Denial};

/// One request to invoke an external capability.
///
/// Exists only for the duration of one gateway call; retries reuse the same
/// correlation id so the gateway can deduplicate them.
#[derive(Debug, Clone)]
pub struct CapabilityRequest {
    pub agent: AgentId,
    pub capability: CapabilityName,
    pub arguments: serde_json::Value,
    pub correlation: CorrelationId,
}

impl CapabilityRequest {
    /// Build a request with a freshly generated correlation id.
    pub fn new(
        agent: impl Into<AgentId>,
        capability: impl Into<CapabilityName>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            agent: agent.into(),
            capability: capability.into(),
            arguments,
            correlation: CorrelationId::generate(),
        }
    }

    /// Reuse an existing correlation id (retry path).
    pub fn with_correlation(mut self, correlation: CorrelationId) -> Self {
        self.correlation = correlation;
        self
    }

    /// Request content rendered for the inbound scan.
    pub fn scan_text(&self) -> String {
        self.arguments.to_string()
    }
}

/// Validated result of a completed capability call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: serde_json::Value,
    /// True when the outbound scan quarantined the raw response and the
    /// content above is a neutral summary.
    pub quarantined: bool,
}

impl ToolOutput {
    pub fn clean(content: serde_json::Value) -> Self {
        Self {
            content,
            quarantined: false,
        }
    }
}

/// What the gateway hands back to an executor.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// The call went through and its result passed the outbound scan.
    Completed(ToolOutput),
    /// The call was refused; no external side effect occurred past the
    /// point of refusal.
    Denied(Denial),
}

impl InvocationOutcome {
    pub fn is_denied(&self) -> bool {
        matches!(self, InvocationOutcome::Denied(_))
    }
}

/// The set of capability names one agent may invoke.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityAllowlist(HashSet<CapabilityName>);

impl CapabilityAllowlist {
    pub fn new(names: impl IntoIterator<Item = CapabilityName>) -> Self {
        Self(names.into_iter().collect())
    }

    pub fn allows(&self, capability: &CapabilityName) -> bool {
        self.0.contains(capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<CapabilityName> for CapabilityAllowlist {
    fn from_iter<T: IntoIterator<Item = CapabilityName>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
