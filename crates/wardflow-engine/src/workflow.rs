//! Workflow and phase data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wardflow_core::{AgentId, WorkflowId};
use wardflow_gateway::CapabilityAllowlist;

use crate::executor::AgentOutcome;
use crate::pattern::ReasoningPattern;

/// The six stages of the development workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    Clarification,
    Planning,
    Development,
    Testing,
    Deployment,
    Maintenance,
}

impl PhaseName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::Clarification => "clarification",
            PhaseName::Planning => "planning",
            PhaseName::Development => "development",
            PhaseName::Testing => "testing",
            PhaseName::Deployment => "deployment",
            PhaseName::Maintenance => "maintenance",
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared status set for workflows, phases, and their mirror states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// A phase whose skip flag was set; never terminal for a workflow.
    Skipped,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Skipped
        )
    }
}

/// What happens to the workflow when a phase fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// A failed phase halts the workflow (default).
    #[default]
    Halt,
    /// The failure is accepted as a terminal phase outcome and later
    /// phases still run.
    AcceptFailure,
}

/// An agent definition at workflow submission: identity plus the
/// capabilities it may invoke. The risk score is owned by the guardrail,
/// not the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub allowlist: CapabilityAllowlist,
}

impl AgentProfile {
    pub fn new(id: impl Into<AgentId>, allowlist: CapabilityAllowlist) -> Self {
        Self {
            id: id.into(),
            allowlist,
        }
    }
}

/// One phase of a submitted workflow specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub name: PhaseName,
    /// Skip flag: a disabled phase transitions directly to `Skipped`
    /// without creating any executor.
    pub enabled: bool,
    pub pattern: ReasoningPattern,
    /// Assignment order; phase results merge in this order.
    pub agents: Vec<AgentId>,
    #[serde(default)]
    pub fallback: FallbackPolicy,
}

impl PhaseSpec {
    pub fn new(
        name: PhaseName,
        pattern: ReasoningPattern,
        agents: impl IntoIterator<Item = AgentId>,
    ) -> Self {
        Self {
            name,
            enabled: true,
            pattern,
            agents: agents.into_iter().collect(),
            fallback: FallbackPolicy::Halt,
        }
    }

    /// Mark this phase skipped.
    pub fn skipped(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }
}

/// A workflow submission: agent profiles, the task, and the ordered phase
/// list with per-phase skip flags and agent/pattern assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub task: String,
    pub agents: Vec<AgentProfile>,
    pub phases: Vec<PhaseSpec>,
}

impl WorkflowSpec {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            agents: Vec::new(),
            phases: Vec::new(),
        }
    }

    pub fn with_agent(mut self, profile: AgentProfile) -> Self {
        self.agents.push(profile);
        self
    }

    pub fn with_phase(mut self, phase: PhaseSpec) -> Self {
        self.phases.push(phase);
        self
    }
}

/// Deterministic merge of a phase's agent results, in assignment order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub outputs: Vec<AgentOutcome>,
}

/// Runtime state of one phase. Owned exclusively by its workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub name: PhaseName,
    pub enabled: bool,
    pub pattern: ReasoningPattern,
    pub agents: Vec<AgentId>,
    pub fallback: FallbackPolicy,
    pub status: RunStatus,
    pub result: Option<PhaseResult>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<PhaseSpec> for Phase {
    fn from(spec: PhaseSpec) -> Self {
        Self {
            name: spec.name,
            enabled: spec.enabled,
            pattern: spec.pattern,
            agents: spec.agents,
            fallback: spec.fallback,
            status: RunStatus::Pending,
            result: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Runtime state of one workflow. Mutated only by the engine's driver
/// task; snapshots handed out elsewhere are clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub task: String,
    pub phases: Vec<Phase>,
    /// Monotonically non-decreasing index of the phase being driven.
    pub current_phase: usize,
    pub status: RunStatus,
}

impl Workflow {
    pub fn from_spec(id: WorkflowId, spec: &WorkflowSpec) -> Self {
        Self {
            id,
            task: spec.task.clone(),
            phases: spec.phases.iter().cloned().map(Phase::from).collect(),
            current_phase: 0,
            status: RunStatus::Pending,
        }
    }

    pub fn phase(&self, name: PhaseName) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }
}
