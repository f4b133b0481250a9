//! Error types for gateway operations

use thiserror::Error;
use wardflow_core::CapabilityName;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that escape the gateway's local recovery.
///
/// Denials never appear here: a denied request is a successful gateway
/// outcome (`InvocationOutcome::Denied`) that the executor may recover
/// from. These errors surface as phase failures.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The capability collaborator stayed unreachable through the bounded
    /// retry schedule, or the capability was never discovered.
    #[error("Capability '{capability}' unavailable after {attempts} attempt(s): {reason}")]
    CapabilityUnavailable {
        capability: CapabilityName,
        attempts: u32,
        reason: String,
    },

    /// The collaborator reached the tool but execution failed.
    #[error("Capability '{capability}' failed: {reason}")]
    CapabilityFailed {
        capability: CapabilityName,
        reason: String,
    },

    /// The requesting agent was never registered with the gateway.
    #[error("Agent '{0}' is not registered with the gateway")]
    UnknownAgent(String),
}

/// Errors reported by a capability collaborator.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport-level failure; retriable.
    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    /// The tool ran and failed; not retriable.
    #[error("Execution failed: {0}")]
    Execution(String),
}
