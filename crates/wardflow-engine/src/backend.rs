//! Pluggable reasoning backend.
//!
//! The core never implements natural-language reasoning itself: each stage
//! execution is delegated to a `ReasoningBackend` collaborator, which
//! returns what the stage produced and, for `act`/`interact` stages, what
//! the agent wants to do next. `ScriptedBackend` is the deterministic
//! implementation used by tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use wardflow_bus::MessagePayload;
use wardflow_core::{AgentId, CapabilityName};

use crate::pattern::{ReasoningPattern, Stage};

/// A capability the backend wants invoked during an `act` stage.
#[derive(Debug, Clone)]
pub struct CapabilityCall {
    pub capability: CapabilityName,
    pub arguments: serde_json::Value,
}

impl CapabilityCall {
    pub fn new(capability: impl Into<CapabilityName>, arguments: serde_json::Value) -> Self {
        Self {
            capability: capability.into(),
            arguments,
        }
    }
}

/// What one stage execution produced.
#[derive(Debug, Clone, Default)]
pub struct StageOutcome {
    /// Reasoning artifact appended to the agent's working notes.
    pub note: String,
    /// Capability to invoke; honored only in `act` stages.
    pub action: Option<CapabilityCall>,
    /// Message to send to the phase conversation; honored only in
    /// `interact` stages.
    pub message: Option<MessagePayload>,
    /// Completion signal, read at the pattern's completion stage:
    /// a satisfied `observe`, or an accepting `self-evaluate`/`validate`.
    pub complete: bool,
}

impl StageOutcome {
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            ..Self::default()
        }
    }

    pub fn completing(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            complete: true,
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: CapabilityCall) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_message(mut self, message: impl Into<MessagePayload>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Everything a backend sees when executing one stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub agent: AgentId,
    pub pattern: ReasoningPattern,
    pub stage: Stage,
    /// 1-based iteration counter.
    pub iteration: u32,
    /// The task assigned to the owning phase.
    pub task: String,
    /// Working notes accumulated so far, oldest first.
    pub notes: Vec<String>,
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend failed in stage '{stage}': {reason}")]
    StageFailed { stage: String, reason: String },
}

/// Stage execution collaborator.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn execute_stage(&self, ctx: &StageContext) -> BackendResult<StageOutcome>;
}

/// Deterministic backend driven by pre-loaded per-stage responses.
///
/// Responses queue per stage and are consumed in order; once a stage's
/// queue is empty the default outcome is returned. The invocation counter
/// lets tests assert exactly how many stage executions happened.
pub struct ScriptedBackend {
    responses: Mutex<HashMap<Stage, VecDeque<StageOutcome>>>,
    default: StageOutcome,
    invocations: AtomicU32,
}

impl ScriptedBackend {
    /// Backend whose default outcome completes immediately.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            default: StageOutcome::completing("ok"),
            invocations: AtomicU32::new(0),
        }
    }

    /// Replace the default outcome returned when a stage queue is empty.
    pub fn with_default(mut self, outcome: StageOutcome) -> Self {
        self.default = outcome;
        self
    }

    /// Queue one response for a stage.
    pub fn with_stage_response(self, stage: Stage, outcome: StageOutcome) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(stage)
            .or_default()
            .push_back(outcome);
        self
    }

    /// Total stage executions across all agents.
    pub fn invocation_count(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn execute_stage(&self, ctx: &StageContext) -> BackendResult<StageOutcome> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = responses
            .get_mut(&ctx.stage)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| self.default.clone());
        Ok(outcome)
    }
}
