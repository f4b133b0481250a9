//! # Wardflow Engine
//!
//! The workflow orchestration core: a phase state machine that assigns
//! each enabled phase to one or more reasoning-pattern executors, collects
//! their terminal states, and decides transitions. Executors exchange
//! messages over the bus and reach external capabilities only through the
//! security-gated gateway.

pub mod backend;
pub mod engine;
pub mod error;
pub mod executor;
pub mod pattern;
pub mod workflow;

pub use backend::{
    BackendError, BackendResult, CapabilityCall, ReasoningBackend, ScriptedBackend, StageContext,
    StageOutcome,
};
pub use engine::{EngineConfig, WorkflowEngine, WorkflowHandle};
pub use error::{EngineError, EngineResult};
pub use executor::{
    AgentOutcome, ExecutorConfig, ExecutorStatus, FailureReason, ReasoningPatternExecutor,
};
pub use pattern::{ReasoningPattern, Stage};
pub use workflow::{
    AgentProfile, FallbackPolicy, Phase, PhaseName, PhaseResult, PhaseSpec, RunStatus, Workflow,
    WorkflowSpec,
};
