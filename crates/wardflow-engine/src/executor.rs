//! Per-agent reasoning-pattern execution loop.
//!
//! An executor is a single-threaded state machine over its pattern's stage
//! sequence. It suspends only while awaiting a gateway result or the next
//! inbound conversation message; both suspension points are cancellable.
//! No state is shared between executors except through messages and the
//! gateway.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wardflow_bus::{AgentBus, Message, MessageDraft, MessageStream};
use wardflow_core::config::duration_secs;
use wardflow_core::{
    Actor, AgentId, AuditKind, AuditLog, ConversationId, MemoryKey, MemoryStore, MemoryUpdate,
};
use wardflow_gateway::{CapabilityRequest, InvocationOutcome, ToolInvocationGateway};

use crate::backend::{CapabilityCall, ReasoningBackend, StageContext};
use crate::pattern::{ReasoningPattern, Stage};

/// Executor loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum iterations for looping patterns; exceeding it fails the
    /// executor with `iteration-limit-exceeded`.
    pub max_iterations: u32,
    /// Bound on one `interact` wait for an inbound message. The bus wait
    /// itself has no timeout; this is the executor's own stage bound.
    #[serde(with = "duration_secs")]
    pub interact_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            interact_timeout: Duration::from_secs(5),
        }
    }
}

/// Why an executor failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    IterationLimitExceeded,
    CapabilityUnavailable,
    BackendFailure,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::IterationLimitExceeded => write!(f, "iteration-limit-exceeded"),
            FailureReason::CapabilityUnavailable => write!(f, "capability-unavailable"),
            FailureReason::BackendFailure => write!(f, "backend-failure"),
        }
    }
}

/// Terminal per-agent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutorStatus {
    Completed { output: String },
    Failed { reason: FailureReason, detail: String },
    Cancelled,
}

impl ExecutorStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutorStatus::Completed { .. })
    }
}

/// One agent's contribution to a phase result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub agent: AgentId,
    pub status: ExecutorStatus,
    /// Working notes, oldest first.
    pub notes: Vec<String>,
}

enum StepFlow {
    Continue(String),
    Cancelled,
    Fatal(String),
}

/// Runs one agent's stage loop for one phase.
pub struct ReasoningPatternExecutor {
    agent: AgentId,
    pattern: ReasoningPattern,
    conversation: ConversationId,
    task: String,
    backend: Arc<dyn ReasoningBackend>,
    bus: Arc<dyn AgentBus>,
    gateway: Arc<ToolInvocationGateway>,
    memory: Arc<dyn MemoryStore>,
    audit: Arc<AuditLog>,
    config: ExecutorConfig,
}

impl ReasoningPatternExecutor {
    pub fn new(
        agent: AgentId,
        pattern: ReasoningPattern,
        conversation: ConversationId,
        task: String,
        backend: Arc<dyn ReasoningBackend>,
        bus: Arc<dyn AgentBus>,
        gateway: Arc<ToolInvocationGateway>,
        memory: Arc<dyn MemoryStore>,
        audit: Arc<AuditLog>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            agent,
            pattern,
            conversation,
            task,
            backend,
            bus,
            gateway,
            memory,
            audit,
            config,
        }
    }

    /// Drive the stage loop to a terminal per-agent state.
    pub async fn run(self, cancel: watch::Receiver<bool>) -> AgentOutcome {
        let mut notes = Vec::new();
        self.recall(&mut notes);

        let mut inbox = if self.pattern.interacts() {
            match self.bus.subscribe(&self.agent, &self.conversation).await {
                Ok(stream) => Some(stream),
                Err(e) => {
                    tracing::warn!(agent = %self.agent, error = %e, "subscribe failed");
                    None
                }
            }
        } else {
            None
        };

        let status = self.run_loop(&mut notes, &mut inbox, cancel).await;

        // Leaving a phase (terminal or cancelled) releases the
        // subscription.
        if inbox.is_some()
            && let Err(e) = self.bus.unsubscribe(&self.agent, &self.conversation).await
        {
            tracing::debug!(agent = %self.agent, error = %e, "unsubscribe failed");
        }

        self.persist(&notes);
        AgentOutcome {
            agent: self.agent.clone(),
            status,
            notes,
        }
    }

    async fn run_loop(
        &self,
        notes: &mut Vec<String>,
        inbox: &mut Option<MessageStream>,
        mut cancel: watch::Receiver<bool>,
    ) -> ExecutorStatus {
        let max_iterations = if self.pattern.is_iterative() {
            self.config.max_iterations.max(1)
        } else {
            1
        };

        for iteration in 1..=max_iterations {
            for stage in self.pattern.stages() {
                if *cancel.borrow() {
                    return ExecutorStatus::Cancelled;
                }

                let ctx = StageContext {
                    agent: self.agent.clone(),
                    pattern: self.pattern,
                    stage: *stage,
                    iteration,
                    task: self.task.clone(),
                    notes: notes.clone(),
                };
                let outcome = match self.backend.execute_stage(&ctx).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        return ExecutorStatus::Failed {
                            reason: FailureReason::BackendFailure,
                            detail: e.to_string(),
                        };
                    }
                };
                tracing::debug!(
                    agent = %self.agent,
                    stage = %stage,
                    iteration,
                    "stage executed"
                );
                notes.push(format!("{}: {}", stage, outcome.note));

                if *stage == Stage::Act
                    && let Some(call) = outcome.action.clone()
                {
                    match self.invoke_capability(call, &mut cancel).await {
                        StepFlow::Continue(note) => notes.push(note),
                        StepFlow::Cancelled => return ExecutorStatus::Cancelled,
                        StepFlow::Fatal(detail) => {
                            return ExecutorStatus::Failed {
                                reason: FailureReason::CapabilityUnavailable,
                                detail,
                            };
                        }
                    }
                }

                if *stage == Stage::Interact {
                    let payload = outcome
                        .message
                        .clone()
                        .unwrap_or_else(|| notes.last().cloned().unwrap_or_default().into());
                    if let Err(e) = self
                        .bus
                        .publish(
                            &self.conversation,
                            MessageDraft::new(self.agent.clone(), payload),
                        )
                        .await
                    {
                        tracing::warn!(agent = %self.agent, error = %e, "publish failed");
                    }
                    if let Some(stream) = inbox.as_mut() {
                        match self.await_reply(stream, &mut cancel).await {
                            StepFlow::Continue(note) => notes.push(note),
                            StepFlow::Cancelled => return ExecutorStatus::Cancelled,
                            StepFlow::Fatal(detail) => {
                                return ExecutorStatus::Failed {
                                    reason: FailureReason::BackendFailure,
                                    detail,
                                };
                            }
                        }
                    }
                }

                if self.pattern.completion_stage() == Some(*stage) && outcome.complete {
                    let output = notes.last().cloned().unwrap_or_default();
                    return ExecutorStatus::Completed { output };
                }
            }

            if !self.pattern.is_iterative() {
                let output = notes.last().cloned().unwrap_or_default();
                return ExecutorStatus::Completed { output };
            }
        }

        ExecutorStatus::Failed {
            reason: FailureReason::IterationLimitExceeded,
            detail: format!("no completion after {} iterations", max_iterations),
        }
    }

    // The only suspension points: a gateway call and a conversation wait.
    // Both race against the phase cancel signal.
    async fn invoke_capability(
        &self,
        call: CapabilityCall,
        cancel: &mut watch::Receiver<bool>,
    ) -> StepFlow {
        let request = CapabilityRequest::new(self.agent.clone(), call.capability, call.arguments);
        tokio::select! {
            _ = wait_cancelled(cancel) => {
                // An aborted call is cancelled, not denied, and audited
                // separately.
                self.audit.record(
                    Actor::Agent(self.agent.clone()),
                    AuditKind::InvocationCancelled,
                    None,
                    format!(
                        "capability={} correlation={}",
                        request.capability, request.correlation
                    ),
                );
                StepFlow::Cancelled
            }
            result = self.gateway.invoke(&request) => match result {
                Ok(InvocationOutcome::Completed(output)) => {
                    StepFlow::Continue(format!("observation: {}", output.content))
                }
                Ok(InvocationOutcome::Denied(denial)) => {
                    // Recovered locally: note the denial and keep going.
                    StepFlow::Continue(format!(
                        "fallback: capability {} denied ({})",
                        request.capability, denial.reason
                    ))
                }
                Err(err) => StepFlow::Fatal(err.to_string()),
            }
        }
    }

    async fn await_reply(
        &self,
        stream: &mut MessageStream,
        cancel: &mut watch::Receiver<bool>,
    ) -> StepFlow {
        tokio::select! {
            _ = wait_cancelled(cancel) => StepFlow::Cancelled,
            reply = tokio::time::timeout(
                self.config.interact_timeout,
                next_peer_message(stream, &self.agent),
            ) => match reply {
                Ok(Some(message)) => StepFlow::Continue(format!(
                    "peer {}: {}",
                    message.sender,
                    message.payload.as_scan_text()
                )),
                Ok(None) => StepFlow::Continue("conversation closed".to_string()),
                Err(_) => StepFlow::Continue("no reply within wait window".to_string()),
            }
        }
    }

    fn recall(&self, notes: &mut Vec<String>) {
        if let Ok(key) = MemoryKey::new(&format!("agent:{}:last-note", self.agent))
            && let Ok(Some(previous)) = self.memory.load(&key)
        {
            notes.push(format!("recalled: {}", previous));
        }
    }

    fn persist(&self, notes: &[String]) {
        let Some(last) = notes.last() else { return };
        match MemoryUpdate::new(&format!("agent:{}:last-note", self.agent), last.clone()) {
            Ok(update) => {
                if let Err(e) = self.memory.store(update) {
                    tracing::warn!(agent = %self.agent, error = %e, "memory store failed");
                }
            }
            Err(e) => tracing::warn!(agent = %self.agent, error = %e, "invalid memory key"),
        }
    }
}

async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone without a cancel: nothing left to wait for.
            std::future::pending::<()>().await;
        }
    }
}

async fn next_peer_message(stream: &mut MessageStream, own: &AgentId) -> Option<Message> {
    // Skip self-delivered messages; an interact wait is for a peer.
    while let Some(message) = stream.next().await {
        if &message.sender != own {
            return Some(message);
        }
    }
    None
}
