//! Reasoning patterns as ordered stage sequences.
//!
//! Patterns are a tagged variant over a common stage-sequence abstraction:
//! each pattern supplies its ordered stage list, whether it loops, and
//! which stage's outcome decides completion. The executor interprets the
//! sequence; it never needs pattern-specific control flow beyond these
//! three answers.

use serde::{Deserialize, Serialize};

/// A named step in an agent's reasoning loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decompose,
    Reason,
    Generate,
    Act,
    Observe,
    Interact,
    SelfEvaluate,
    Produce,
    Analyze,
    Reflect,
    Improve,
    Validate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decompose => "decompose",
            Stage::Reason => "reason",
            Stage::Generate => "generate",
            Stage::Act => "act",
            Stage::Observe => "observe",
            Stage::Interact => "interact",
            Stage::SelfEvaluate => "self-evaluate",
            Stage::Produce => "produce",
            Stage::Analyze => "analyze",
            Stage::Reflect => "reflect",
            Stage::Improve => "improve",
            Stage::Validate => "validate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The reasoning strategy governing one agent's step loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasoningPattern {
    #[serde(rename = "chain-of-thought")]
    ChainOfThought,
    #[serde(rename = "react")]
    ReAct,
    #[serde(rename = "raise")]
    Raise,
    #[serde(rename = "self-refine")]
    SelfRefine,
    #[serde(rename = "reflexion")]
    Reflexion,
}

impl ReasoningPattern {
    /// Ordered stage list executed per iteration.
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            ReasoningPattern::ChainOfThought => {
                &[Stage::Decompose, Stage::Reason, Stage::Generate]
            }
            ReasoningPattern::ReAct => &[Stage::Reason, Stage::Act, Stage::Observe],
            ReasoningPattern::Raise => &[
                Stage::Reason,
                Stage::Act,
                Stage::Observe,
                Stage::Interact,
                Stage::SelfEvaluate,
            ],
            ReasoningPattern::SelfRefine => {
                &[Stage::Produce, Stage::Analyze, Stage::Improve, Stage::Validate]
            }
            ReasoningPattern::Reflexion => {
                &[Stage::Produce, Stage::Reflect, Stage::Improve, Stage::Validate]
            }
        }
    }

    /// Whether the stage list repeats until the completion stage accepts
    /// (bounded by the configured maximum iteration count).
    pub fn is_iterative(&self) -> bool {
        !matches!(self, ReasoningPattern::ChainOfThought)
    }

    /// The stage whose outcome decides loop completion. `None` for
    /// single-pass patterns.
    ///
    /// A rejecting `self-evaluate`/`validate` re-enters the loop rather
    /// than terminating; the same holds for an unsatisfied `observe`.
    pub fn completion_stage(&self) -> Option<Stage> {
        match self {
            ReasoningPattern::ChainOfThought => None,
            ReasoningPattern::ReAct => Some(Stage::Observe),
            ReasoningPattern::Raise => Some(Stage::SelfEvaluate),
            ReasoningPattern::SelfRefine | ReasoningPattern::Reflexion => Some(Stage::Validate),
        }
    }

    /// Whether this pattern exchanges messages over the bus.
    pub fn interacts(&self) -> bool {
        self.stages().contains(&Stage::Interact)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReasoningPattern::ChainOfThought => "chain-of-thought",
            ReasoningPattern::ReAct => "react",
            ReasoningPattern::Raise => "raise",
            ReasoningPattern::SelfRefine => "self-refine",
            ReasoningPattern::Reflexion => "reflexion",
        }
    }
}

impl std::fmt::Display for ReasoningPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
