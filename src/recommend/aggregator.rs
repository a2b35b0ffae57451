//! Merges candidates from every strategy into the final ranked list.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::RecommendConfig;

use super::types::SkillRecommendation;

/// Dedupes, ranks and flags auto-activation.
#[derive(Debug, Clone)]
pub struct Aggregator {
    threshold: f64,
    max_results: usize,
}

impl Aggregator {
    /// `max_results == 0` disables the cap.
    #[must_use]
    pub fn new(threshold: f64, max_results: usize) -> Self {
        Self {
            threshold,
            max_results,
        }
    }

    #[must_use]
    pub fn from_config(config: &RecommendConfig) -> Self {
        Self::new(config.auto_activate_threshold, config.max_recommendations)
    }

    /// Auto-activation threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Merge `candidates` into one entry per skill and rank them.
    ///
    /// The merged confidence is the maximum of the contributions; reasons and
    /// triggers from every contribution are kept. Ranking is by confidence,
    /// then strategy priority, then average user rating from `ratings`, then
    /// skill name.
    #[must_use]
    pub fn aggregate(
        &self,
        candidates: Vec<SkillRecommendation>,
        ratings: &BTreeMap<String, f64>,
    ) -> Vec<SkillRecommendation> {
        let mut merged: BTreeMap<String, SkillRecommendation> = BTreeMap::new();
        for candidate in candidates {
            match merged.get_mut(&candidate.skill_name) {
                Some(existing) => merge_into(existing, candidate),
                None => {
                    merged.insert(candidate.skill_name.clone(), candidate);
                }
            }
        }

        let mut ranked: Vec<SkillRecommendation> = merged.into_values().collect();
        ranked.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.strategy.cmp(&b.strategy))
                .then_with(|| {
                    let ra = ratings.get(&a.skill_name).copied().unwrap_or(0.0);
                    let rb = ratings.get(&b.skill_name).copied().unwrap_or(0.0);
                    rb.partial_cmp(&ra).unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.skill_name.cmp(&b.skill_name))
        });

        if self.max_results > 0 {
            ranked.truncate(self.max_results);
        }
        for rec in &mut ranked {
            rec.confidence = rec.confidence.clamp(0.0, 1.0);
            rec.auto_activate = rec.confidence >= self.threshold;
        }
        ranked
    }
}

fn merge_into(existing: &mut SkillRecommendation, other: SkillRecommendation) {
    existing.confidence = existing.confidence.max(other.confidence);
    existing.strategy = existing.strategy.min(other.strategy);
    existing.estimated_value = existing.estimated_value.max(other.estimated_value);

    if !other.reason.is_empty() && !existing.reason.split("; ").any(|r| r == other.reason) {
        if existing.reason.is_empty() {
            existing.reason = other.reason;
        } else {
            existing.reason.push_str("; ");
            existing.reason.push_str(&other.reason);
        }
    }
    for trigger in other.triggers {
        if !existing.triggers.contains(&trigger) {
            existing.triggers.push(trigger);
        }
    }
    for agent in other.related_agents {
        if !existing.related_agents.contains(&agent) {
            existing.related_agents.push(agent);
        }
    }
    existing.related_agents.sort();
}
