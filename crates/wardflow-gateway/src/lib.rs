//! # Wardflow Gateway
//!
//! Security-gated capability invocation.
//!
//! External tool servers are discovered into a registry; every invocation
//! runs the full gated path (allowlist, rate limit, inbound scan, deadline,
//! outbound scan) before its result can reach an agent. Denials are values
//! the requesting executor can recover from; no external side effect ever
//! precedes a verdict.

pub mod error;
pub mod gateway;
pub mod registry;
pub mod request;

pub use error::{GatewayError, GatewayResult, ProviderError};
pub use gateway::{GatewayConfig, ToolInvocationGateway};
pub use registry::{CapabilityDescriptor, CapabilityProvider, CapabilityRegistry};
pub use request::{CapabilityAllowlist, CapabilityRequest, InvocationOutcome, ToolOutput};
