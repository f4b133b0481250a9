//! # Wardflow
//!
//! Wardflow is a security-gated orchestration engine for autonomous
//! software agents. It coordinates a multi-phase development workflow
//! (clarification, planning, development, testing, deployment,
//! maintenance) where each phase is executed by agents following a
//! reasoning pattern, exchanging messages over an ordered conversation
//! bus, and reaching external capabilities only through a policy-enforced
//! gateway.
//!
//! ## Core Components
//!
//! - **[WorkflowEngine]**: phase state machine; spawns executors, collects
//!   results, decides transitions
//! - **[ReasoningPatternExecutor]**: one agent's stage loop for a pattern
//!   ([ReasoningPattern]: chain-of-thought, react, raise, self-refine,
//!   reflexion)
//! - **[AgentBus] / [InMemoryBus]**: conversation-ordered message routing
//!   with guardrail-backed filtering
//! - **[ToolInvocationGateway]**: the only path to external capabilities;
//!   allowlist, rate limit, inbound scan, deadline, outbound scan
//! - **[SecurityGuardrail]**: content detectors, risk scoring, rate
//!   limiting, agent blocking
//! - **[AuditLog]**: append-only record of security and lifecycle events
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wardflow::{
//!     AgentId, AgentProfile, AuditConfig, AuditLog, CapabilityAllowlist,
//!     CapabilityRegistry, EngineConfig, GatewayConfig, GuardrailConfig,
//!     InMemoryBus, InMemoryStore, PhaseName, PhaseSpec, ReasoningPattern,
//!     ScriptedBackend, SecurityGuardrail, ToolInvocationGateway,
//!     WorkflowEngine, WorkflowSpec,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let audit = Arc::new(AuditLog::new(AuditConfig::default()));
//! let guardrail = Arc::new(SecurityGuardrail::new(GuardrailConfig::default(), audit.clone()));
//! let registry = Arc::new(CapabilityRegistry::new(audit.clone()));
//! let gateway = Arc::new(ToolInvocationGateway::new(
//!     registry,
//!     guardrail,
//!     audit.clone(),
//!     GatewayConfig::default(),
//! ));
//!
//! let engine = WorkflowEngine::new(
//!     Arc::new(InMemoryBus::new(audit.clone())),
//!     gateway,
//!     Arc::new(ScriptedBackend::new()),
//!     Arc::new(InMemoryStore::new()),
//!     audit,
//!     EngineConfig::default(),
//! );
//!
//! let spec = WorkflowSpec::new("ship the feature")
//!     .with_agent(AgentProfile::new("planner", CapabilityAllowlist::default()))
//!     .with_phase(PhaseSpec::new(
//!         PhaseName::Planning,
//!         ReasoningPattern::ChainOfThought,
//!         [AgentId::from("planner")],
//!     ));
//!
//! let handle = engine.start(spec).unwrap();
//! let finished = handle.wait().await;
//! println!("workflow ended {:?}", finished.status);
//! # }
//! ```

pub use wardflow_bus::{
    AgentBus, BusError, BusResult, GuardrailFilter, InMemoryBus, Message, MessageDraft,
    MessageFilter, MessageId, MessagePayload, MessageStream, NoopFilter,
};
pub use wardflow_core::{
    Actor, AgentId, AuditConfig, AuditEvent, AuditKind, AuditLog, CapabilityName, ContentScanner,
    ConversationId, CorrelationId, Decision, Denial, DenyReason, Detector, GuardrailConfig,
    IdValidationError, InMemoryStore, InvalidMemoryKey, MemoryError, MemoryKey, MemoryReader,
    MemoryResult, MemoryStore, MemoryUpdate, MemoryWriter, RateDecision, RiskDecay, ScanDirection,
    SecurityError, SecurityGuardrail, SecurityResult, SecurityVerdict, SlidingWindowRateLimiter,
    WorkflowId,
};
pub use wardflow_engine::{
    AgentOutcome, AgentProfile, BackendError, BackendResult, CapabilityCall, EngineConfig,
    EngineError, EngineResult, ExecutorConfig, ExecutorStatus, FailureReason, FallbackPolicy,
    Phase, PhaseName, PhaseResult, PhaseSpec, ReasoningBackend, ReasoningPattern,
    ReasoningPatternExecutor, RunStatus, ScriptedBackend, Stage, StageContext, StageOutcome,
    Workflow, WorkflowEngine, WorkflowHandle, WorkflowSpec,
};
pub use wardflow_gateway::{
    CapabilityAllowlist, CapabilityDescriptor, CapabilityProvider, CapabilityRegistry,
    CapabilityRequest, GatewayConfig, GatewayError, GatewayResult, InvocationOutcome,
    ProviderError, ToolInvocationGateway, ToolOutput,
};
