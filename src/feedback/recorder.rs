//! Feedback recorder: persists surfaced recommendations and their outcomes.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::context::{ContextHash, NormalizedContext};
use crate::error::{Result, SkillError};
use crate::ratings::bump_usage;
use crate::recommend::{SkillRecommendation, StrategyKind};
use crate::store::{format_timestamp, parse_timestamp, Store};

use super::patterns::{self, decode_list, encode_list};
use super::types::{ContextPattern, FeedbackOutcome, FeedbackStats, RecommendationRecord};

const RECORD_COLUMNS: &str =
    "id, timestamp, skill_name, confidence, context_hash, strategy, was_activated, was_helpful, reason";

/// Reason stored when a skill is activated without a prior recommendation.
pub const MANUAL_ACTIVATION_REASON: &str = "activated manually";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<RecommendationRecord> {
    let id: String = row.get(0)?;
    let timestamp: String = row.get(1)?;
    let context_hash: String = row.get(4)?;
    let strategy: String = row.get(5)?;

    Ok(RecommendationRecord {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
        timestamp: parse_timestamp(&timestamp).unwrap_or_else(Utc::now),
        skill_name: row.get(2)?,
        confidence: row.get(3)?,
        context_hash: ContextHash::from_hex(context_hash),
        strategy: StrategyKind::parse(&strategy).unwrap_or(StrategyKind::RuleBased),
        was_activated: row.get(6)?,
        was_helpful: row.get(7)?,
        reason: row.get(8)?,
    })
}

fn find_record(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<RecommendationRecord>> {
    conn.query_row(
        &format!("SELECT {RECORD_COLUMNS} FROM recommendations_history WHERE id = ?1"),
        params![id.to_string()],
        record_from_row,
    )
    .optional()
}

fn insert_record(
    conn: &Connection,
    ctx: &NormalizedContext,
    rec: &SkillRecommendation,
    activated: bool,
    now: DateTime<Utc>,
) -> Result<RecommendationRecord> {
    let record = RecommendationRecord {
        id: Uuid::new_v4(),
        timestamp: now,
        skill_name: rec.skill_name.clone(),
        confidence: rec.confidence,
        context_hash: ctx.hash.clone(),
        strategy: rec.strategy,
        was_activated: activated,
        was_helpful: None,
        reason: rec.reason.clone(),
    };
    conn.execute(
        "INSERT INTO recommendations_history
             (id, timestamp, skill_name, confidence, context_hash, file_patterns, active_agents,
              strategy, was_activated, reason)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            record.id.to_string(),
            format_timestamp(now),
            record.skill_name,
            record.confidence,
            record.context_hash.as_str(),
            encode_list(&ctx.file_patterns)?,
            encode_list(&ctx.active_agents)?,
            record.strategy.as_str(),
            activated,
            record.reason,
        ],
    )?;
    if activated {
        bump_usage(conn, &record.skill_name, now)?;
    }
    Ok(record)
}

/// Persists recommendations at emission time and folds feedback back into
/// the learned context patterns.
#[derive(Debug, Clone)]
pub struct FeedbackRecorder {
    store: Store,
}

impl FeedbackRecorder {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Persist one surfaced recommendation with no feedback yet.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the insert fails.
    pub fn record(
        &self,
        ctx: &NormalizedContext,
        rec: &SkillRecommendation,
        activated: bool,
    ) -> Result<RecommendationRecord> {
        let now = Utc::now();
        let record = self
            .store
            .write(|tx| insert_record(tx, ctx, rec, activated, now))?;
        tracing::debug!(
            id = %record.id,
            skill = %record.skill_name,
            context_hash = %record.context_hash,
            activated,
            "Recorded recommendation"
        );
        Ok(record)
    }

    /// Persist a batch of surfaced recommendations in one transaction.
    /// Recommendations flagged `auto_activate` are stored as activated.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if any insert fails; nothing is stored then.
    pub fn record_all(
        &self,
        ctx: &NormalizedContext,
        recs: &[SkillRecommendation],
    ) -> Result<Vec<RecommendationRecord>> {
        let now = Utc::now();
        self.store.write(|tx| {
            recs.iter()
                .map(|rec| insert_record(tx, ctx, rec, rec.auto_activate, now))
                .collect::<Result<Vec<_>>>()
        })
    }

    /// Mark that `skill` was acted on in this context.
    ///
    /// Flags the most recent not-yet-activated record for the same context
    /// and skill that has no feedback yet. Records with feedback are never
    /// touched. Without such a record, a manual activation is recorded so
    /// feedback can still be attached.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Validation`] for an empty skill name, or
    /// [`SkillError::Persistence`] on store failure.
    pub fn record_activation(&self, ctx: &NormalizedContext, skill: &str) -> Result<RecommendationRecord> {
        let skill = skill.trim();
        if skill.is_empty() {
            return Err(SkillError::Validation("skill name is empty".to_string()));
        }

        let now = Utc::now();
        let record = self.store.write(|tx| {
            let pending: Option<String> = tx
                .query_row(
                    "SELECT id FROM recommendations_history
                     WHERE context_hash = ?1 AND skill_name = ?2
                       AND was_activated = 0 AND was_helpful IS NULL
                     ORDER BY timestamp DESC, rowid DESC LIMIT 1",
                    params![ctx.hash.as_str(), skill],
                    |row| row.get(0),
                )
                .optional()?;

            match pending {
                Some(id) => {
                    tx.execute(
                        "UPDATE recommendations_history SET was_activated = 1 WHERE id = ?1",
                        params![id],
                    )?;
                    bump_usage(tx, skill, now)?;
                    let id = Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil());
                    find_record(tx, id)?.ok_or(SkillError::NotFound(id))
                }
                None => {
                    let manual = SkillRecommendation::new(
                        skill,
                        0.0,
                        MANUAL_ACTIVATION_REASON,
                        StrategyKind::RuleBased,
                    );
                    insert_record(tx, ctx, &manual, true, now)
                }
            }
        })?;

        tracing::info!(id = %record.id, skill = %record.skill_name, "Recorded activation");
        Ok(record)
    }

    /// Attach feedback to a recorded recommendation and update the learned
    /// pattern for its context, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::NotFound`] for an unknown id,
    /// [`SkillError::AlreadyRecorded`] if feedback exists already, or
    /// [`SkillError::Persistence`] on store failure. On any error nothing changes.
    pub fn submit_feedback(
        &self,
        recommendation_id: Uuid,
        helpful: bool,
        succeeded: bool,
        comment: Option<&str>,
    ) -> Result<FeedbackOutcome> {
        let now = Utc::now();
        let comment = comment.map(str::trim).filter(|c| !c.is_empty());

        let outcome = self.store.write(|tx| {
            let row: Option<(Option<bool>, String, String, String, String)> = tx
                .query_row(
                    "SELECT was_helpful, skill_name, context_hash, file_patterns, active_agents
                     FROM recommendations_history WHERE id = ?1",
                    params![recommendation_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                )
                .optional()?;
            let Some((was_helpful, skill, hash, file_patterns, active_agents)) = row else {
                return Err(SkillError::NotFound(recommendation_id));
            };
            if was_helpful.is_some() {
                return Err(SkillError::AlreadyRecorded(recommendation_id));
            }

            tx.execute(
                "UPDATE recommendations_history SET was_helpful = ?1 WHERE id = ?2",
                params![helpful, recommendation_id.to_string()],
            )?;
            tx.execute(
                "INSERT INTO recommendation_feedback (recommendation_id, helpful, succeeded, comment, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    recommendation_id.to_string(),
                    helpful,
                    succeeded,
                    comment,
                    format_timestamp(now)
                ],
            )?;

            let hash = ContextHash::from_hex(hash);
            let file_patterns = decode_list(&file_patterns).unwrap_or_else(|err| {
                tracing::warn!(id = %recommendation_id, error = %err, "Corrupt file_patterns on record");
                Vec::new()
            });
            let active_agents = decode_list(&active_agents).unwrap_or_else(|err| {
                tracing::warn!(id = %recommendation_id, error = %err, "Corrupt active_agents on record");
                Vec::new()
            });
            let pattern = patterns::record_observation(
                tx,
                &hash,
                &file_patterns,
                &active_agents,
                &skill,
                succeeded,
                now,
            )?;

            let record = find_record(tx, recommendation_id)?
                .ok_or(SkillError::NotFound(recommendation_id))?;
            Ok(FeedbackOutcome { record, pattern })
        })?;

        tracing::info!(
            id = %recommendation_id,
            skill = %outcome.record.skill_name,
            helpful,
            succeeded,
            success_rate = outcome.pattern.success_rate,
            "Recorded feedback"
        );
        Ok(outcome)
    }

    /// Look up one record.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the query fails.
    pub fn get_record(&self, id: Uuid) -> Result<Option<RecommendationRecord>> {
        self.store.read(|conn| Ok(find_record(conn, id)?))
    }

    /// Most recent records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the query fails.
    pub fn history(&self, limit: usize) -> Result<Vec<RecommendationRecord>> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM recommendations_history
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?1"
            ))?;
            let records = stmt
                .query_map(
                    params![i64::try_from(limit).unwrap_or(i64::MAX)],
                    record_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }

    /// Totals over the whole history.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the query fails.
    pub fn stats(&self) -> Result<FeedbackStats> {
        self.store.read(|conn| {
            let (recorded, activated, with_feedback, helpful) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(was_activated), 0),
                        COALESCE(SUM(was_helpful IS NOT NULL), 0),
                        COALESCE(SUM(was_helpful = 1), 0)
                 FROM recommendations_history",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
            let succeeded = conn.query_row(
                "SELECT COALESCE(SUM(succeeded), 0) FROM recommendation_feedback",
                [],
                |row| row.get(0),
            )?;
            let patterns = conn.query_row("SELECT COUNT(*) FROM context_patterns", [], |row| row.get(0))?;
            Ok(FeedbackStats {
                recorded,
                activated,
                with_feedback,
                helpful,
                succeeded,
                patterns,
            })
        })
    }

    /// Look up the learned pattern for a context.
    ///
    /// A row that fails to decode is reported as absent and logged.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the query fails.
    pub fn get_pattern(&self, hash: &ContextHash) -> Result<Option<ContextPattern>> {
        let raw = self.store.read(|conn| Ok::<_, SkillError>(patterns::find_raw(conn, hash)?))?;
        Ok(raw.and_then(|raw| match raw.decode() {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                tracing::warn!(context_hash = %hash, error = %err, "Skipping corrupt context pattern");
                None
            }
        }))
    }

    /// Apply the retention policy to learned patterns.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the delete fails.
    pub fn prune_patterns(&self, retention_days: u32, max_patterns: usize) -> Result<usize> {
        let now = Utc::now();
        let removed = self
            .store
            .write(|tx| Ok::<_, SkillError>(patterns::prune(tx, retention_days, max_patterns, now)?))?;
        tracing::info!(removed, retention_days, max_patterns, "Pruned context patterns");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SessionContext;
    use crate::store::StoreSettings;
    use tempfile::TempDir;

    fn recorder() -> (TempDir, FeedbackRecorder) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("advisor.db"), StoreSettings::default()).unwrap();
        (dir, FeedbackRecorder::new(store))
    }

    fn ctx() -> NormalizedContext {
        SessionContext::new("python")
            .with_file("src/auth/login.py")
            .with_agent("security-auditor")
            .normalize()
    }

    fn rec(skill: &str, confidence: f64) -> SkillRecommendation {
        SkillRecommendation::new(skill, confidence, "because", StrategyKind::RuleBased)
    }

    #[test]
    fn test_record_starts_without_feedback() {
        let (_dir, recorder) = recorder();
        let record = recorder.record(&ctx(), &rec("owasp-top-10", 0.9), false).unwrap();

        assert!(record.was_helpful.is_none());
        assert!(!record.was_activated);
        let stored = recorder.get_record(record.id).unwrap().unwrap();
        assert_eq!(stored.skill_name, "owasp-top-10");
        assert_eq!(stored.context_hash, ctx().hash);
        assert!(stored.was_helpful.is_none());
    }

    #[test]
    fn test_feedback_unknown_id() {
        let (_dir, recorder) = recorder();
        let id = Uuid::new_v4();
        let err = recorder.submit_feedback(id, true, true, None).unwrap_err();
        assert!(matches!(err, SkillError::NotFound(found) if found == id));
    }

    #[test]
    fn test_feedback_is_write_once() {
        let (_dir, recorder) = recorder();
        let record = recorder.record(&ctx(), &rec("owasp-top-10", 0.9), true).unwrap();

        let first = recorder
            .submit_feedback(record.id, true, true, Some("great"))
            .unwrap();
        assert_eq!(first.record.was_helpful, Some(true));

        let err = recorder
            .submit_feedback(record.id, false, false, None)
            .unwrap_err();
        assert!(matches!(err, SkillError::AlreadyRecorded(_)));

        let stored = recorder.get_record(record.id).unwrap().unwrap();
        assert_eq!(stored.was_helpful, Some(true));
        let pattern = recorder.get_pattern(&ctx().hash).unwrap().unwrap();
        assert_eq!(pattern.observations, 1);
        assert_eq!(pattern.successes, 1);
    }

    #[test]
    fn test_feedback_creates_pattern_for_new_context() {
        let (_dir, recorder) = recorder();
        let record = recorder.record(&ctx(), &rec("owasp-top-10", 0.9), true).unwrap();

        let outcome = recorder.submit_feedback(record.id, true, true, None).unwrap();
        assert!((outcome.pattern.success_rate - 1.0).abs() < f64::EPSILON);
        assert!(outcome.pattern.successful_skills.contains("owasp-top-10"));
        assert_eq!(outcome.pattern.file_patterns, vec!["*.py"]);
        assert_eq!(outcome.pattern.active_agents, vec!["security-auditor"]);
    }

    #[test]
    fn test_record_activation_flags_pending_record() {
        let (_dir, recorder) = recorder();
        let record = recorder.record(&ctx(), &rec("owasp-top-10", 0.9), false).unwrap();

        let activated = recorder.record_activation(&ctx(), "owasp-top-10").unwrap();
        assert_eq!(activated.id, record.id);
        assert!(activated.was_activated);
    }

    #[test]
    fn test_record_activation_without_recommendation() {
        let (_dir, recorder) = recorder();
        let activated = recorder.record_activation(&ctx(), "api-design").unwrap();

        assert!(activated.was_activated);
        assert_eq!(activated.reason, MANUAL_ACTIVATION_REASON);
        assert!(activated.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_activation_leaves_rated_record_alone() {
        let (_dir, recorder) = recorder();
        let record = recorder.record(&ctx(), &rec("owasp-top-10", 0.9), false).unwrap();
        recorder.submit_feedback(record.id, false, false, None).unwrap();
        let before = recorder.get_record(record.id).unwrap().unwrap();

        let activated = recorder.record_activation(&ctx(), "owasp-top-10").unwrap();
        assert_ne!(activated.id, record.id);
        assert!(activated.was_activated);
        assert_eq!(activated.reason, MANUAL_ACTIVATION_REASON);

        let after = recorder.get_record(record.id).unwrap().unwrap();
        assert_eq!(after, before);
        assert!(!after.was_activated);
        assert_eq!(after.was_helpful, Some(false));
    }

    #[test]
    fn test_record_activation_rejects_empty_skill() {
        let (_dir, recorder) = recorder();
        let err = recorder.record_activation(&ctx(), "  ").unwrap_err();
        assert!(matches!(err, SkillError::Validation(_)));
    }

    #[test]
    fn test_record_all_and_history() {
        let (_dir, recorder) = recorder();
        let mut auto = rec("owasp-top-10", 0.9);
        auto.auto_activate = true;
        let manual = rec("secure-coding", 0.5);

        let records = recorder.record_all(&ctx(), &[auto, manual]).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].was_activated);
        assert!(!records[1].was_activated);

        let history = recorder.history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(recorder.history(1).unwrap().len(), 1);

        let stats = recorder.stats().unwrap();
        assert_eq!(stats.recorded, 2);
        assert_eq!(stats.activated, 1);
        assert_eq!(stats.with_feedback, 0);
    }

    #[test]
    fn test_stats_count_feedback() {
        let (_dir, recorder) = recorder();
        let a = recorder.record(&ctx(), &rec("a", 0.9), true).unwrap();
        let b = recorder.record(&ctx(), &rec("b", 0.9), true).unwrap();
        recorder.submit_feedback(a.id, true, true, None).unwrap();
        recorder.submit_feedback(b.id, false, false, None).unwrap();

        let stats = recorder.stats().unwrap();
        assert_eq!(stats.with_feedback, 2);
        assert_eq!(stats.helpful, 1);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.patterns, 1);
    }

    #[test]
    fn test_prune_patterns_respects_cap() {
        let (_dir, recorder) = recorder();
        for (i, skill) in ["a", "b", "c"].iter().enumerate() {
            let ctx = SessionContext::new("")
                .with_file(format!("file{i}.ext{i}"))
                .normalize();
            let record = recorder.record(&ctx, &rec(skill, 0.9), true).unwrap();
            recorder.submit_feedback(record.id, true, true, None).unwrap();
        }

        assert_eq!(recorder.prune_patterns(90, 2).unwrap(), 1);
        assert_eq!(recorder.stats().unwrap().patterns, 2);
    }
}
