//! Pattern learner: confidence from historical success.
//!
//! Consults the exact pattern for the caller's context hash plus the most
//! recently updated high-success patterns. Each pattern adds its success
//! rate to every skill it lists; the sums are divided by the number of
//! patterns consulted, which keeps them in [0, 1].

use std::collections::BTreeMap;

use crate::config::PatternConfig;
use crate::context::NormalizedContext;
use crate::error::{Result, SkillError};
use crate::feedback::{find_raw, recent_successful, ContextPattern, RawPatternRow};
use crate::store::Store;

use super::types::{SkillRecommendation, StrategyKind};

/// Derives recommendations from learned context patterns.
#[derive(Debug, Clone)]
pub struct PatternLearner {
    store: Store,
    success_threshold: f64,
    recent_limit: usize,
}

#[derive(Debug, Default)]
struct SkillScore {
    total: f64,
    patterns: usize,
    exact: bool,
}

impl PatternLearner {
    #[must_use]
    pub fn new(store: Store, config: &PatternConfig) -> Self {
        Self {
            store,
            success_threshold: config.success_threshold,
            recent_limit: config.recent_limit,
        }
    }

    /// Load and decode the patterns to consult. Corrupt rows are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the store cannot be queried.
    pub fn load_patterns(&self, ctx: &NormalizedContext) -> Result<Vec<ContextPattern>> {
        let (exact, recent) = self.store.read(|conn| {
            let exact = find_raw(conn, &ctx.hash)?
                .filter(|row| row.success_rate > self.success_threshold);
            let recent = recent_successful(conn, self.success_threshold, self.recent_limit)?;
            Ok::<_, SkillError>((exact, recent))
        })?;

        let mut rows: Vec<RawPatternRow> = exact.into_iter().collect();
        rows.extend(
            recent
                .into_iter()
                .filter(|row| row.context_hash != ctx.hash.as_str()),
        );

        Ok(rows
            .iter()
            .filter_map(|row| match row.decode() {
                Ok(pattern) => Some(pattern),
                Err(err) => {
                    tracing::warn!(
                        context_hash = %row.context_hash,
                        error = %err,
                        "Skipping corrupt context pattern"
                    );
                    None
                }
            })
            .collect())
    }

    /// Score skills from the patterns relevant to `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the store cannot be queried.
    pub fn recommend(&self, ctx: &NormalizedContext) -> Result<Vec<SkillRecommendation>> {
        let patterns = self.load_patterns(ctx)?;
        let recs = score_patterns(&patterns, ctx);
        tracing::debug!(
            context_hash = %ctx.hash,
            patterns = patterns.len(),
            candidates = recs.len(),
            "Scored learned patterns"
        );
        Ok(recs)
    }
}

/// Turn decoded patterns into candidates.
#[allow(clippy::cast_precision_loss)]
fn score_patterns(patterns: &[ContextPattern], ctx: &NormalizedContext) -> Vec<SkillRecommendation> {
    if patterns.is_empty() {
        return Vec::new();
    }

    let mut scores: BTreeMap<&str, SkillScore> = BTreeMap::new();
    for pattern in patterns {
        let exact = pattern.context_hash == ctx.hash;
        for skill in &pattern.successful_skills {
            let score = scores.entry(skill.as_str()).or_default();
            score.total += pattern.success_rate;
            score.patterns += 1;
            score.exact |= exact;
        }
    }

    let consulted = patterns.len() as f64;
    scores
        .into_iter()
        .map(|(skill, score)| {
            let confidence = (score.total / consulted).clamp(0.0, 1.0);
            let average = score.total / score.patterns as f64;
            let mut reason = format!(
                "Succeeded in {} of {} similar past sessions (avg success {:.0}%)",
                score.patterns,
                patterns.len(),
                average * 100.0
            );
            let mut triggers = vec![format!("patterns:{}", score.patterns)];
            if score.exact {
                reason.push_str(", including this exact context");
                triggers.push(format!("context:{}", ctx.hash));
            }
            SkillRecommendation::new(skill, confidence, reason, StrategyKind::PatternBased)
                .with_triggers(triggers)
        })
        .collect()
}
