//! Top-level phase state machine.
//!
//! One driver task per workflow walks the declared phase order: skipped
//! phases transition directly to `Skipped` with zero executors, enabled
//! phases spawn one executor task per assigned agent and wait for all of
//! them to reach a terminal per-agent state. A phase that fails without an
//! accepted fallback halts the workflow.

use chrono::Utc;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use wardflow_bus::AgentBus;
use wardflow_core::{Actor, AuditKind, AuditLog, ConversationId, MemoryStore, WorkflowId};
use wardflow_gateway::ToolInvocationGateway;

use crate::backend::ReasoningBackend;
use crate::error::{EngineError, EngineResult};
use crate::executor::{AgentOutcome, ExecutorConfig, ExecutorStatus, ReasoningPatternExecutor};
use crate::workflow::{PhaseResult, FallbackPolicy, RunStatus, Workflow, WorkflowSpec};

/// Engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub executor: ExecutorConfig,
}

/// Live handle to a started workflow.
///
/// Snapshots are clones of the driver's state; the driver task is the only
/// writer.
#[derive(Debug)]
pub struct WorkflowHandle {
    id: WorkflowId,
    shared: Arc<RwLock<Workflow>>,
    cancel: watch::Sender<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl WorkflowHandle {
    pub fn id(&self) -> WorkflowId {
        self.id
    }

    /// Current workflow snapshot.
    pub fn snapshot(&self) -> Workflow {
        self.shared.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Wait for the driver task to finish and return the final snapshot.
    pub async fn wait(&self) -> Workflow {
        let handle = self.driver.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(workflow = %self.id, error = %e, "driver task panicked");
        }
        self.snapshot()
    }
}

/// Assigns phases to executors, collects results, and decides transitions.
pub struct WorkflowEngine {
    bus: Arc<dyn AgentBus>,
    gateway: Arc<ToolInvocationGateway>,
    backend: Arc<dyn ReasoningBackend>,
    memory: Arc<dyn MemoryStore>,
    audit: Arc<AuditLog>,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(
        bus: Arc<dyn AgentBus>,
        gateway: Arc<ToolInvocationGateway>,
        backend: Arc<dyn ReasoningBackend>,
        memory: Arc<dyn MemoryStore>,
        audit: Arc<AuditLog>,
        config: EngineConfig,
    ) -> Self {
        Self {
            bus,
            gateway,
            backend,
            memory,
            audit,
            config,
        }
    }

    /// Validate a submission, register its agents, and spawn the driver.
    pub fn start(&self, spec: WorkflowSpec) -> EngineResult<WorkflowHandle> {
        Self::validate(&spec)?;

        for profile in &spec.agents {
            self.gateway
                .register_agent(profile.id.clone(), profile.allowlist.clone());
        }

        let id = WorkflowId::generate();
        let workflow = Workflow::from_spec(id, &spec);
        let shared = Arc::new(RwLock::new(workflow));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        self.audit.record(
            Actor::System,
            AuditKind::WorkflowStarted,
            None,
            format!("workflow={} phases={}", id, spec.phases.len()),
        );
        tracing::info!(workflow = %id, phases = spec.phases.len(), "workflow started");

        let driver = tokio::spawn(drive(DriverCtx {
            id,
            shared: shared.clone(),
            cancel: cancel_rx,
            bus: self.bus.clone(),
            gateway: self.gateway.clone(),
            backend: self.backend.clone(),
            memory: self.memory.clone(),
            audit: self.audit.clone(),
            executor_config: self.config.executor.clone(),
            task: spec.task,
        }));

        Ok(WorkflowHandle {
            id,
            shared,
            cancel: cancel_tx,
            driver: Mutex::new(Some(driver)),
        })
    }

    /// Cancel a workflow. Propagates to every in-flight executor and is
    /// idempotent.
    pub fn cancel(&self, handle: &WorkflowHandle) {
        let already = handle.cancel.send_replace(true);
        if !already {
            tracing::info!(workflow = %handle.id(), "workflow cancelled");
        }
    }

    /// Current workflow snapshot.
    pub fn status(&self, handle: &WorkflowHandle) -> Workflow {
        handle.snapshot()
    }

    fn validate(spec: &WorkflowSpec) -> EngineResult<()> {
        if spec.phases.is_empty() {
            return Err(EngineError::InvalidSpec(
                "workflow needs at least one phase".to_string(),
            ));
        }
        for phase in &spec.phases {
            if phase.enabled && phase.agents.is_empty() {
                return Err(EngineError::InvalidSpec(format!(
                    "enabled phase '{}' has no agents",
                    phase.name
                )));
            }
            for agent in &phase.agents {
                if !spec.agents.iter().any(|p| &p.id == agent) {
                    return Err(EngineError::InvalidSpec(format!(
                        "phase '{}' references unknown agent '{}'",
                        phase.name, agent
                    )));
                }
            }
        }
        Ok(())
    }
}

struct DriverCtx {
    id: WorkflowId,
    shared: Arc<RwLock<Workflow>>,
    cancel: watch::Receiver<bool>,
    bus: Arc<dyn AgentBus>,
    gateway: Arc<ToolInvocationGateway>,
    backend: Arc<dyn ReasoningBackend>,
    memory: Arc<dyn MemoryStore>,
    audit: Arc<AuditLog>,
    executor_config: ExecutorConfig,
    task: String,
}

impl DriverCtx {
    fn update<R>(&self, f: impl FnOnce(&mut Workflow) -> R) -> R {
        let mut workflow = self.shared.write().unwrap_or_else(|e| e.into_inner());
        f(&mut workflow)
    }

    fn phase_transition(&self, phase: &str, status: RunStatus) {
        self.audit.record(
            Actor::System,
            AuditKind::PhaseTransition,
            None,
            format!("workflow={} phase={} status={:?}", self.id, phase, status),
        );
    }

    fn finish(&self, status: RunStatus, detail: &str) {
        self.update(|w| w.status = status);
        self.audit.record(
            Actor::System,
            AuditKind::WorkflowFinished,
            None,
            format!("workflow={} status={:?} {}", self.id, status, detail),
        );
        tracing::info!(workflow = %self.id, ?status, detail, "workflow finished");
    }
}

async fn drive(ctx: DriverCtx) {
    ctx.update(|w| w.status = RunStatus::Running);
    let phase_count = ctx.update(|w| w.phases.len());

    for idx in 0..phase_count {
        if *ctx.cancel.borrow() {
            ctx.finish(RunStatus::Failed, "cancelled");
            return;
        }

        // The current phase index only ever moves forward.
        let (name, enabled, pattern, agents, fallback) = ctx.update(|w| {
            w.current_phase = idx;
            let phase = &w.phases[idx];
            (
                phase.name,
                phase.enabled,
                phase.pattern,
                phase.agents.clone(),
                phase.fallback,
            )
        });

        if !enabled {
            // Skip flag set: terminal without invoking any executor.
            ctx.update(|w| w.phases[idx].status = RunStatus::Skipped);
            ctx.phase_transition(name.as_str(), RunStatus::Skipped);
            continue;
        }

        ctx.update(|w| {
            w.phases[idx].status = RunStatus::Running;
            w.phases[idx].started_at = Some(Utc::now());
        });
        ctx.phase_transition(name.as_str(), RunStatus::Running);

        let conversation = ConversationId::parse(format!("wf.{}.{}", ctx.id, name))
            .expect("workflow conversation id is valid");

        // One executor task per assigned agent, joined in assignment order
        // so the merged result is deterministic.
        let mut handles = Vec::with_capacity(agents.len());
        for agent in &agents {
            let executor = ReasoningPatternExecutor::new(
                agent.clone(),
                pattern,
                conversation.clone(),
                ctx.task.clone(),
                ctx.backend.clone(),
                ctx.bus.clone(),
                ctx.gateway.clone(),
                ctx.memory.clone(),
                ctx.audit.clone(),
                ctx.executor_config.clone(),
            );
            let cancel = ctx.cancel.clone();
            handles.push((agent.clone(), tokio::spawn(executor.run(cancel))));
        }

        let mut outputs: Vec<AgentOutcome> = Vec::with_capacity(handles.len());
        for (agent, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => AgentOutcome {
                    agent,
                    status: ExecutorStatus::Failed {
                        reason: crate::executor::FailureReason::BackendFailure,
                        detail: format!("executor task failed: {}", e),
                    },
                    notes: Vec::new(),
                },
            };
            outputs.push(outcome);
        }

        let cancelled = outputs
            .iter()
            .any(|o| o.status == ExecutorStatus::Cancelled);
        let failed = outputs
            .iter()
            .any(|o| matches!(o.status, ExecutorStatus::Failed { .. }));

        let phase_status = if cancelled || failed {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        ctx.update(|w| {
            w.phases[idx].status = phase_status;
            w.phases[idx].finished_at = Some(Utc::now());
            w.phases[idx].result = Some(PhaseResult { outputs });
        });
        ctx.phase_transition(name.as_str(), phase_status);

        if cancelled {
            ctx.finish(RunStatus::Failed, "cancelled");
            return;
        }
        if phase_status == RunStatus::Failed {
            match fallback {
                FallbackPolicy::AcceptFailure => {
                    // Terminal with fallback accepted: later phases run.
                    tracing::warn!(
                        workflow = %ctx.id,
                        phase = %name,
                        "phase failed, fallback accepted"
                    );
                }
                FallbackPolicy::Halt => {
                    ctx.finish(RunStatus::Failed, &format!("phase {} failed", name));
                    return;
                }
            }
        }
    }

    ctx.finish(RunStatus::Completed, "all phases terminal");
}
