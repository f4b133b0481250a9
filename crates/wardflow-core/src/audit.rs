//! Append-only audit log for security and lifecycle events.
//!
//! The log is safe for concurrent writers: records are only ever appended
//! (never mutated in place), and readers receive cloned snapshots. Events
//! older than the configured horizon are pruned on write.

use crate::config::AuditConfig;
use crate::identifiers::AgentId;
use crate::security::SecurityVerdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use uuid::Uuid;

/// Who performed or triggered an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "actor", content = "id", rename_all = "snake_case")]
pub enum Actor {
    System,
    Agent(AgentId),
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::System => write!(f, "system"),
            Actor::Agent(id) => write!(f, "{}", id),
        }
    }
}

/// Kinds of audited events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A bus message was withheld from delivery by the content filter.
    MessageFiltered,
    /// A capability call was refused by the sliding-window rate limiter.
    RateDenied,
    /// An agent's risk score crossed the ceiling.
    AgentBlocked,
    /// An agent was explicitly unblocked and its score reset.
    AgentUnblocked,
    /// A capability invocation was refused before or after the external call.
    InvocationDenied,
    /// A capability invocation completed and its result passed outbound scan.
    InvocationCompleted,
    /// An in-flight capability invocation was aborted by phase cancellation.
    InvocationCancelled,
    /// A capability was discovered and registered with the gateway.
    CapabilityDiscovered,
    /// A workflow was accepted and its driver task spawned.
    WorkflowStarted,
    /// A phase changed status.
    PhaseTransition,
    /// A workflow reached a terminal status.
    WorkflowFinished,
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub kind: AuditKind,
    /// Verdict attached to security events; absent for lifecycle events.
    pub verdict: Option<SecurityVerdict>,
    /// Free-form detail (capability name, correlation id, phase name, ...).
    pub detail: String,
}

/// Append-only event log with a bounded retention horizon.
pub struct AuditLog {
    events: RwLock<Vec<AuditEvent>>,
    config: AuditConfig,
}

impl AuditLog {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Append one event. Prunes records older than the retention horizon.
    pub fn record(
        &self,
        actor: Actor,
        kind: AuditKind,
        verdict: Option<SecurityVerdict>,
        detail: impl Into<String>,
    ) {
        let event = AuditEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor,
            kind,
            verdict,
            detail: detail.into(),
        };
        tracing::debug!(
            actor = %event.actor,
            kind = ?event.kind,
            detail = %event.detail,
            "audit event"
        );

        let horizon = Utc::now()
            - chrono::Duration::from_std(self.config.retain_for)
                .unwrap_or_else(|_| chrono::Duration::days(1));
        let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
        events.retain(|e| e.timestamp >= horizon);
        events.push(event);
    }

    /// Ordered snapshot of all retained events, oldest first.
    ///
    /// This is the export surface consumed by external observability
    /// collaborators; records are immutable copies.
    pub fn export(&self) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Events whose actor matches `actor`, oldest first.
    pub fn events_for(&self, actor: &Actor) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| &e.actor == actor)
            .cloned()
            .collect()
    }

    /// Number of retained events of the given kind.
    pub fn count_kind(&self, kind: AuditKind) -> usize {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(AuditConfig::default())
    }
}
