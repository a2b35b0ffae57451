//! Recommendation types.

use serde::{Deserialize, Serialize};

/// Which signal source produced a candidate.
///
/// Declaration order is tie-break priority: explicit rules outrank agent
/// mappings, which outrank statistically inferred patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Declarative file/agent rules.
    RuleBased,
    /// Static agent-skill mapping.
    AgentBased,
    /// Learned context patterns.
    PatternBased,
}

impl StrategyKind {
    /// Returns the string representation for database storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::AgentBased => "agent_based",
            Self::PatternBased => "pattern_based",
        }
    }

    /// Parse the database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rule_based" => Some(Self::RuleBased),
            "agent_based" => Some(Self::AgentBased),
            "pattern_based" => Some(Self::PatternBased),
            _ => None,
        }
    }
}

/// Coarse estimate of how much a skill will help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatedValue {
    Low,
    Medium,
    High,
}

impl EstimatedValue {
    /// Derive the estimate from a confidence score.
    #[must_use]
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            Self::High
        } else if confidence >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// One candidate skill suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRecommendation {
    /// Skill to activate.
    pub skill_name: String,
    /// Support for the suggestion, in [0, 1].
    pub confidence: f64,
    /// Human-readable explanation. Merged entries join every contributing reason.
    pub reason: String,
    /// What triggered the suggestion (matched globs, agents, patterns).
    pub triggers: Vec<String>,
    /// Active agents related to the suggestion.
    pub related_agents: Vec<String>,
    /// Coarse value estimate.
    pub estimated_value: EstimatedValue,
    /// Whether the confidence reached the auto-activation threshold.
    pub auto_activate: bool,
    /// Highest-priority strategy that proposed the skill.
    pub strategy: StrategyKind,
}

impl SkillRecommendation {
    /// Create a candidate. `auto_activate` is decided later by the aggregator.
    pub fn new(
        skill_name: impl Into<String>,
        confidence: f64,
        reason: impl Into<String>,
        strategy: StrategyKind,
    ) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            skill_name: skill_name.into(),
            confidence,
            reason: reason.into(),
            triggers: Vec::new(),
            related_agents: Vec::new(),
            estimated_value: EstimatedValue::from_confidence(confidence),
            auto_activate: false,
            strategy,
        }
    }

    /// Set the triggers.
    #[must_use]
    pub fn with_triggers(mut self, triggers: Vec<String>) -> Self {
        self.triggers = triggers;
        self
    }

    /// Set the related agents.
    #[must_use]
    pub fn with_related_agents(mut self, agents: Vec<String>) -> Self {
        self.related_agents = agents;
        self
    }

    /// Override the derived value estimate.
    #[must_use]
    pub fn with_estimated_value(mut self, value: EstimatedValue) -> Self {
        self.estimated_value = value;
        self
    }
}
