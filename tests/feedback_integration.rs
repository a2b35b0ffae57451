//! Integration tests for the feedback loop and learned patterns.

use std::time::Duration;

use rusqlite::{params, Connection};
use skill_advisor::config::AdvisorConfig;
use skill_advisor::context::SessionContext;
use skill_advisor::recommend::{SkillRecommendation, StrategyKind};
use skill_advisor::store::{format_timestamp, StoreError};
use skill_advisor::{SkillAdvisor, SkillError};
use tempfile::TempDir;
use uuid::Uuid;

fn config(temp_dir: &TempDir) -> AdvisorConfig {
    let mut config = AdvisorConfig::default();
    config.store.path = temp_dir.path().join("advisor.db");
    config
}

fn advisor(temp_dir: &TempDir) -> SkillAdvisor {
    SkillAdvisor::open(config(temp_dir)).expect("Failed to open advisor")
}

fn auth_context() -> SessionContext {
    SessionContext::new("python")
        .with_file("src/auth/login.py")
        .with_agent("security-auditor")
}

fn rec(skill: &str, confidence: f64) -> SkillRecommendation {
    SkillRecommendation::new(skill, confidence, "matched auth files", StrategyKind::RuleBased)
}

/// Successful feedback on an unseen context creates its pattern.
#[test]
fn test_feedback_creates_pattern_for_unseen_context() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let advisor = advisor(&temp_dir);
    let ctx = auth_context();

    assert!(advisor.get_pattern(&ctx).expect("lookup failed").is_none());

    let record = advisor
        .record(&ctx, &rec("owasp-top-10", 0.9), true)
        .expect("record failed");
    let outcome = advisor
        .submit_feedback(record.id, true, true, Some("caught a bug"))
        .expect("feedback failed");

    assert!((outcome.pattern.success_rate - 1.0).abs() < f64::EPSILON);
    assert!(outcome.pattern.successful_skills.contains("owasp-top-10"));

    let stored = advisor
        .get_pattern(&ctx)
        .expect("lookup failed")
        .expect("pattern missing");
    assert_eq!(stored.context_hash, ctx.normalize().hash);
    assert_eq!(stored.observations, 1);
}

/// A second submission for the same recommendation fails and changes nothing.
#[test]
fn test_duplicate_feedback_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let advisor = advisor(&temp_dir);
    let ctx = auth_context();

    let record = advisor
        .record(&ctx, &rec("owasp-top-10", 0.9), true)
        .expect("record failed");
    advisor
        .submit_feedback(record.id, true, true, None)
        .expect("first feedback failed");

    let err = advisor
        .submit_feedback(record.id, false, false, Some("changed my mind"))
        .expect_err("second feedback should fail");
    assert!(matches!(err, SkillError::AlreadyRecorded(id) if id == record.id));

    let stored = advisor
        .get_record(record.id)
        .expect("lookup failed")
        .expect("record missing");
    assert_eq!(stored.was_helpful, Some(true));

    let pattern = advisor
        .get_pattern(&ctx)
        .expect("lookup failed")
        .expect("pattern missing");
    assert_eq!(pattern.observations, 1);
    assert!((pattern.success_rate - 1.0).abs() < f64::EPSILON);
}

/// Feedback for an id that was never recorded is a not-found error.
#[test]
fn test_feedback_for_unknown_recommendation() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let advisor = advisor(&temp_dir);

    let err = advisor
        .submit_feedback(Uuid::new_v4(), true, true, None)
        .expect_err("feedback should fail");
    assert!(matches!(err, SkillError::NotFound(_)));
    assert_eq!(advisor.feedback_stats().expect("stats failed").with_feedback, 0);
}

/// Learned successes come back as pattern-based recommendations.
#[test]
fn test_learned_pattern_drives_recommendations() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let advisor = advisor(&temp_dir);
    let ctx = auth_context();

    assert!(advisor.recommend(&ctx).expect("recommend failed").is_empty());

    let record = advisor
        .record(&ctx, &rec("owasp-top-10", 0.9), true)
        .expect("record failed");
    advisor
        .submit_feedback(record.id, true, true, None)
        .expect("feedback failed");

    let recs = advisor.recommend(&ctx).expect("recommend failed");
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].skill_name, "owasp-top-10");
    assert_eq!(recs[0].strategy, StrategyKind::PatternBased);
    assert!((recs[0].confidence - 1.0).abs() < f64::EPSILON);
    assert!(recs[0].auto_activate);
}

/// Patterns at or below the success threshold are ignored.
#[test]
fn test_failed_outcomes_are_not_recommended() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let advisor = advisor(&temp_dir);
    let ctx = auth_context();

    let record = advisor
        .record(&ctx, &rec("owasp-top-10", 0.9), true)
        .expect("record failed");
    let outcome = advisor
        .submit_feedback(record.id, false, false, None)
        .expect("feedback failed");

    assert!(outcome.pattern.success_rate.abs() < f64::EPSILON);
    assert!(!outcome.pattern.successful_skills.contains("owasp-top-10"));
    assert!(advisor.recommend(&ctx).expect("recommend failed").is_empty());
}

/// A corrupt pattern row is skipped and the rest still recommend.
#[test]
fn test_corrupt_pattern_row_is_contained() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let advisor = advisor(&temp_dir);
    let ctx = auth_context();

    let record = advisor
        .record(&ctx, &rec("owasp-top-10", 0.9), true)
        .expect("record failed");
    advisor
        .submit_feedback(record.id, true, true, None)
        .expect("feedback failed");

    let conn = Connection::open(advisor.store().path()).expect("Failed to open db");
    conn.execute(
        "INSERT INTO context_patterns
             (context_hash, file_patterns, active_agents, successful_skills,
              observations, successes, success_rate, last_updated)
         VALUES ('deadbeef', '[]', '[]', '{not json', 3, 3, 1.0, ?1)",
        params![format_timestamp(chrono::Utc::now())],
    )
    .expect("Failed to insert corrupt row");
    drop(conn);

    let recs = advisor.recommend(&ctx).expect("recommend failed");
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].skill_name, "owasp-top-10");
    assert!((recs[0].confidence - 1.0).abs() < f64::EPSILON);
}

/// Surfacing records every recommendation and activation follows auto_activate.
#[test]
fn test_surface_and_activation() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let advisor = advisor(&temp_dir);
    let ctx = auth_context();

    let mut auto = rec("owasp-top-10", 0.9);
    auto.auto_activate = true;
    let suggested = rec("threat-modeling", 0.6);

    let records = advisor
        .surface(&ctx, &[auto, suggested])
        .expect("surface failed");
    assert_eq!(records.len(), 2);
    assert!(records[0].was_activated);
    assert!(!records[1].was_activated);

    let activated = advisor
        .record_activation(&ctx, "threat-modeling")
        .expect("activation failed");
    assert_eq!(activated.id, records[1].id);
    assert!(activated.was_activated);

    let stats = advisor.feedback_stats().expect("stats failed");
    assert_eq!(stats.recorded, 2);
    assert_eq!(stats.activated, 2);

    assert_eq!(advisor.get_score("owasp-top-10").expect("score failed").usage_count, 1);
    assert_eq!(advisor.get_score("threat-modeling").expect("score failed").usage_count, 1);
}

/// History lists the newest records first.
#[test]
fn test_history_is_newest_first() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let advisor = advisor(&temp_dir);
    let ctx = auth_context();

    for skill in ["first", "second", "third"] {
        advisor.record(&ctx, &rec(skill, 0.5), false).expect("record failed");
    }

    let history = advisor.history(2).expect("history failed");
    let names: Vec<&str> = history.iter().map(|r| r.skill_name.as_str()).collect();
    assert_eq!(names, vec!["third", "second"]);
}

/// Pruning drops stale patterns and trims to the configured cap.
#[test]
fn test_prune_patterns() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = config(&temp_dir);
    config.patterns.retention_days = 30;
    config.patterns.max_patterns = 2;
    let advisor = SkillAdvisor::open(config).expect("Failed to open advisor");

    let contexts: Vec<SessionContext> = ["py", "rs", "go", "ts"]
        .iter()
        .map(|ext| SessionContext::new("").with_file(format!("src/main.{ext}")))
        .collect();
    for ctx in &contexts {
        let record = advisor.record(ctx, &rec("x", 0.9), true).expect("record failed");
        advisor
            .submit_feedback(record.id, true, true, None)
            .expect("feedback failed");
    }

    let stale = format_timestamp(chrono::Utc::now() - chrono::Duration::days(45));
    let conn = Connection::open(advisor.store().path()).expect("Failed to open db");
    conn.execute(
        "UPDATE context_patterns SET last_updated = ?1 WHERE context_hash = ?2",
        params![stale, contexts[0].normalize().hash.as_str()],
    )
    .expect("Failed to age pattern");
    drop(conn);

    assert_eq!(advisor.prune_patterns().expect("prune failed"), 2);
    assert_eq!(advisor.feedback_stats().expect("stats failed").patterns, 2);
    assert!(advisor.get_pattern(&contexts[0]).expect("lookup failed").is_none());
    assert_eq!(advisor.prune_patterns().expect("prune failed"), 0);
}

/// A write waits out a short lock held by another connection.
#[test]
fn test_write_retries_through_contention() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = config(&temp_dir);
    config.store.busy_timeout_ms = 10;
    config.store.max_write_attempts = 10;
    config.store.backoff_base_ms = 20;
    let advisor = SkillAdvisor::open(config).expect("Failed to open advisor");

    let path = advisor.store().path().to_path_buf();
    let (locked_tx, locked_rx) = std::sync::mpsc::channel();
    let holder = std::thread::spawn(move || {
        let conn = Connection::open(path).expect("Failed to open db");
        conn.execute_batch("BEGIN IMMEDIATE").expect("Failed to lock");
        locked_tx.send(()).expect("Failed to signal");
        std::thread::sleep(Duration::from_millis(150));
        conn.execute_batch("COMMIT").expect("Failed to unlock");
    });

    locked_rx.recv().expect("Lock holder died");
    let record = advisor
        .record(&auth_context(), &rec("owasp-top-10", 0.9), false)
        .expect("record should succeed after retry");
    holder.join().expect("Lock holder panicked");

    assert!(advisor.get_record(record.id).expect("lookup failed").is_some());
}

/// A write that never gets the lock surfaces a persistence error.
#[test]
fn test_write_gives_up_after_retry_budget() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = config(&temp_dir);
    config.store.busy_timeout_ms = 5;
    config.store.max_write_attempts = 2;
    config.store.backoff_base_ms = 5;
    let advisor = SkillAdvisor::open(config).expect("Failed to open advisor");

    let conn = Connection::open(advisor.store().path()).expect("Failed to open db");
    conn.execute_batch("BEGIN IMMEDIATE").expect("Failed to lock");

    let err = advisor
        .record(&auth_context(), &rec("owasp-top-10", 0.9), false)
        .expect_err("record should fail");
    match err {
        SkillError::Persistence(StoreError::Contention { attempts, source }) => {
            assert_eq!(attempts, 2);
            assert_eq!(
                source.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy)
            );
        }
        other => panic!("expected contention error, got {other:?}"),
    }

    conn.execute_batch("ROLLBACK").expect("Failed to unlock");
    assert!(advisor.history(10).expect("history failed").is_empty());
}
