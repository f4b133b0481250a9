//! Ordered content detectors.
//!
//! Detectors run in declaration order against a piece of content. The first
//! match determines the verdict reason; the risk delta accumulates across
//! all matches. Thresholds then map the accumulated delta to a decision.

use super::{Decision, SecurityVerdict};
use crate::error::{SecurityError, SecurityResult};
use once_cell::sync::Lazy;
use regex::Regex;

/// A single named pattern detector with its risk weight.
pub struct Detector {
    name: &'static str,
    pattern: Regex,
    risk_delta: u32,
}

impl Detector {
    /// Compile a detector from a user-supplied pattern.
    pub fn new(name: &'static str, pattern: &str, risk_delta: u32) -> SecurityResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| SecurityError::InvalidPattern {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name,
            pattern,
            risk_delta,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, content: &str) -> bool {
        self.pattern.is_match(content)
    }
}

// Built-in patterns are compiled once; they are known-good literals.
static INJECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(ignore\s+(all\s+)?previous\s+instructions|disregard\s+(the\s+)?system\s+prompt|you\s+are\s+now\s+(the\s+)?(admin|root|developer)|override\s+safety)",
    )
    .expect("injection pattern compiles")
});

static CREDENTIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)((api[_-]?key|secret|password|token|credential)\s*[:=]\s*\S+|AKIA[0-9A-Z]{16}|-----BEGIN\s+(RSA\s+)?PRIVATE\s+KEY-----)"#,
    )
    .expect("credential pattern compiles")
});

static SUSPICIOUS_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(https?://(\d{1,3}\.){3}\d{1,3}|[a-z0-9-]+\.(onion|zip|click)\b)")
        .expect("domain pattern compiles")
});

/// Applies the ordered detector set and maps accumulated risk to a decision.
pub struct ContentScanner {
    detectors: Vec<Detector>,
    deny_threshold: u32,
    quarantine_threshold: u32,
}

impl ContentScanner {
    /// Scanner with the built-in detector set, applied in order:
    /// prompt-injection patterns, credential/secret patterns,
    /// suspicious-domain patterns.
    pub fn with_default_detectors(deny_threshold: u32, quarantine_threshold: u32) -> Self {
        let detectors = vec![
            Detector {
                name: "injection-pattern",
                pattern: INJECTION.clone(),
                risk_delta: 40,
            },
            Detector {
                name: "credential-pattern",
                pattern: CREDENTIAL.clone(),
                risk_delta: 50,
            },
            Detector {
                name: "suspicious-domain",
                pattern: SUSPICIOUS_DOMAIN.clone(),
                risk_delta: 15,
            },
        ];
        Self {
            detectors,
            deny_threshold,
            quarantine_threshold,
        }
    }

    /// Scanner over a custom detector set.
    pub fn new(detectors: Vec<Detector>, deny_threshold: u32, quarantine_threshold: u32) -> Self {
        Self {
            detectors,
            deny_threshold,
            quarantine_threshold,
        }
    }

    /// Scan one piece of content.
    pub fn scan(&self, content: &str) -> SecurityVerdict {
        let mut matched_rules = Vec::new();
        let mut risk_delta = 0u32;
        let mut first_match: Option<&'static str> = None;

        for detector in &self.detectors {
            if detector.matches(content) {
                if first_match.is_none() {
                    first_match = Some(detector.name);
                }
                matched_rules.push(detector.name.to_string());
                risk_delta = risk_delta.saturating_add(detector.risk_delta);
            }
        }

        let Some(reason) = first_match else {
            return SecurityVerdict::allow();
        };

        let decision = if risk_delta >= self.deny_threshold {
            Decision::Deny
        } else if risk_delta >= self.quarantine_threshold {
            Decision::Quarantine
        } else {
            Decision::Allow
        };

        SecurityVerdict {
            decision,
            risk_delta,
            matched_rules,
            reason: reason.to_string(),
        }
    }
}
