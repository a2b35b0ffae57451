//! Rating and quality-metric types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored user rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRating {
    pub id: Uuid,
    pub skill_name: String,
    /// Hash of the rating user, never the raw name.
    pub user_hash: String,
    /// 1 to 5.
    pub stars: u8,
    pub timestamp: DateTime<Utc>,
    pub project_type: Option<String>,
    pub review: Option<String>,
    pub was_helpful: bool,
    pub task_succeeded: bool,
}

/// A rating submission, validated by
/// [`RatingCollector::rate`](super::RatingCollector::rate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRating {
    pub skill: String,
    pub stars: u8,
    pub helpful: bool,
    pub task_succeeded: bool,
    pub review: Option<String>,
    pub project_type: Option<String>,
}

impl NewRating {
    /// Start a submission. Helpful and succeeded default to `false`.
    pub fn new(skill: impl Into<String>, stars: u8) -> Self {
        Self {
            skill: skill.into(),
            stars,
            helpful: false,
            task_succeeded: false,
            review: None,
            project_type: None,
        }
    }

    /// Whether the skill helped.
    #[must_use]
    pub fn helpful(mut self, helpful: bool) -> Self {
        self.helpful = helpful;
        self
    }

    /// Whether the task succeeded.
    #[must_use]
    pub fn succeeded(mut self, succeeded: bool) -> Self {
        self.task_succeeded = succeeded;
        self
    }

    /// Attach a free-text review.
    #[must_use]
    pub fn review(mut self, review: impl Into<String>) -> Self {
        self.review = Some(review.into());
        self
    }

    /// Tag the project type the skill was used in.
    #[must_use]
    pub fn project_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = Some(project_type.into());
        self
    }
}

/// Aggregate view over every rating of one skill.
///
/// `stars_5 + ... + stars_1 == total_ratings` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillQualityMetrics {
    pub skill_name: String,
    pub avg_rating: f64,
    pub total_ratings: u64,
    /// Fraction of ratings marked helpful, in [0, 1].
    pub helpful_percentage: f64,
    /// Fraction of ratings whose task succeeded, in [0, 1].
    pub success_correlation: f64,
    /// Recorded activations.
    pub usage_count: u64,
    pub stars_5: u64,
    pub stars_4: u64,
    pub stars_3: u64,
    pub stars_2: u64,
    pub stars_1: u64,
    /// Unset until the skill is rated or used.
    pub last_updated: Option<DateTime<Utc>>,
}

impl SkillQualityMetrics {
    /// Metrics for a skill nobody has rated.
    pub fn empty(skill_name: impl Into<String>) -> Self {
        Self {
            skill_name: skill_name.into(),
            avg_rating: 0.0,
            total_ratings: 0,
            helpful_percentage: 0.0,
            success_correlation: 0.0,
            usage_count: 0,
            stars_5: 0,
            stars_4: 0,
            stars_3: 0,
            stars_2: 0,
            stars_1: 0,
            last_updated: None,
        }
    }

    /// Histogram as `[stars_1, ..., stars_5]`.
    #[must_use]
    pub fn histogram(&self) -> [u64; 5] {
        [self.stars_1, self.stars_2, self.stars_3, self.stars_4, self.stars_5]
    }

    /// The trust signal derived from these metrics.
    #[must_use]
    pub fn trust_signal(&self) -> TrustSignal {
        TrustSignal {
            skill_name: self.skill_name.clone(),
            avg_rating: self.avg_rating,
            success_correlation: self.success_correlation,
            total_ratings: self.total_ratings,
        }
    }
}

/// Quality signal an external router can use to decide on escalation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrustSignal {
    pub skill_name: String,
    pub avg_rating: f64,
    pub success_correlation: f64,
    pub total_ratings: u64,
}

impl TrustSignal {
    /// Whether the skill has enough ratings and meets both minimums.
    #[must_use]
    pub fn meets(&self, min_rating: f64, min_success: f64, min_ratings: u64) -> bool {
        self.total_ratings >= min_ratings
            && self.avg_rating >= min_rating
            && self.success_correlation >= min_success
    }
}

/// Read-only dump of ratings and metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    pub generated_at: DateTime<Utc>,
    pub skills: Vec<SkillExport>,
}

/// Ratings and metrics of one skill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillExport {
    pub skill_name: String,
    pub metrics: SkillQualityMetrics,
    pub ratings: Vec<SkillRating>,
}
