//! # Wardflow Core
//!
//! Core identifiers, the audit log, and the security guardrail for the
//! wardflow orchestration engine. Every other crate in the workspace builds
//! on the types defined here.

pub mod audit;
pub mod config;
pub mod error;
pub mod identifiers;
pub mod memory;
pub mod security;

pub use audit::{Actor, AuditEvent, AuditKind, AuditLog};
pub use config::{AuditConfig, GuardrailConfig, RiskDecay};
pub use error::{Denial, DenyReason, SecurityError, SecurityResult};
pub use identifiers::{
    AgentId, CapabilityName, ConversationId, CorrelationId, IdValidationError, WorkflowId,
};
pub use memory::{
    InMemoryStore, InvalidMemoryKey, MemoryError, MemoryKey, MemoryReader, MemoryResult,
    MemoryStore, MemoryUpdate, MemoryWriter,
};
pub use security::{
    ContentScanner, Decision, Detector, RateDecision, ScanDirection, SecurityGuardrail,
    SecurityVerdict, SlidingWindowRateLimiter,
};
