//! Feedback and learned-pattern types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ContextHash;
use crate::recommend::StrategyKind;

/// Durable log entry for a surfaced recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    /// Unique record ID, used to attach feedback.
    pub id: Uuid,
    /// When the recommendation was recorded.
    pub timestamp: DateTime<Utc>,
    /// Recommended skill.
    pub skill_name: String,
    /// Confidence at emission time.
    pub confidence: f64,
    /// Context the recommendation was made for.
    pub context_hash: ContextHash,
    /// Strategy that produced the recommendation.
    pub strategy: StrategyKind,
    /// Whether the skill was activated.
    pub was_activated: bool,
    /// Feedback, once given. Never changes afterwards.
    pub was_helpful: Option<bool>,
    /// Explanation shown with the recommendation.
    pub reason: String,
}

/// Learned association between a context and the skills that worked in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPattern {
    pub context_hash: ContextHash,
    pub file_patterns: Vec<String>,
    pub active_agents: Vec<String>,
    pub successful_skills: BTreeSet<String>,
    /// Feedback submissions seen for this context.
    pub observations: u64,
    /// Submissions reporting success.
    pub successes: u64,
    /// `successes / observations`.
    pub success_rate: f64,
    pub last_updated: DateTime<Utc>,
}

/// Result of a successful feedback submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackOutcome {
    /// The record with feedback applied.
    pub record: RecommendationRecord,
    /// The pattern after the upsert.
    pub pattern: ContextPattern,
}

/// Totals over the recommendation history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedbackStats {
    pub recorded: u64,
    pub activated: u64,
    pub with_feedback: u64,
    pub helpful: u64,
    pub succeeded: u64,
    pub patterns: u64,
}

impl FeedbackStats {
    /// Fraction of feedback submissions marked helpful, `0.0` without feedback.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn helpful_rate(&self) -> f64 {
        if self.with_feedback == 0 {
            0.0
        } else {
            self.helpful as f64 / self.with_feedback as f64
        }
    }
}
