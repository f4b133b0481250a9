//! Configuration types for the security layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serde helper serializing `Duration` as whole seconds.
pub mod duration_secs {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// How an agent's accumulated risk score is allowed to shrink.
///
/// The score is monotonically non-decreasing within a workflow execution
/// unless a windowed reset is configured: an agent that stays quiet for the
/// full window has its score cleared. A blocked agent is never cleared this
/// way; only an explicit unblock does that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RiskDecay {
    /// Score never decays; only an explicit unblock resets it.
    Never,
    /// Score resets to zero after `window` of inactivity.
    WindowedReset {
        #[serde(with = "duration_secs")]
        window: Duration,
    },
}

impl Default for RiskDecay {
    fn default() -> Self {
        RiskDecay::Never
    }
}

/// Guardrail policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Risk score at or above which an agent is blocked.
    pub risk_ceiling: u32,
    /// Maximum capability calls per (agent, capability) pair per window.
    pub rate_limit: u32,
    /// Sliding rate-limit window.
    #[serde(with = "duration_secs")]
    pub rate_window: Duration,
    /// Fixed risk increment added on each rate-limit breach.
    pub rate_penalty: u32,
    /// Accumulated per-scan risk delta at or above which content is denied.
    pub deny_threshold: u32,
    /// Accumulated per-scan risk delta at or above which content is
    /// quarantined (but below `deny_threshold`).
    pub quarantine_threshold: u32,
    /// Risk decay policy.
    #[serde(default)]
    pub decay: RiskDecay,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            risk_ceiling: 100,
            rate_limit: 5,
            rate_window: Duration::from_secs(60),
            rate_penalty: 10,
            deny_threshold: 40,
            quarantine_threshold: 15,
            decay: RiskDecay::Never,
        }
    }
}

/// Audit retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// How long audit events are retained before pruning.
    #[serde(with = "duration_secs")]
    pub retain_for: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retain_for: Duration::from_secs(24 * 60 * 60),
        }
    }
}
