//! Database schema for the advisor store.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the advisor database.
pub const SCHEMA: &str = r"
-- Enable WAL mode so a background hook can read while a session writes
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Every recommendation that was surfaced to the user
CREATE TABLE IF NOT EXISTS recommendations_history (
    id TEXT PRIMARY KEY NOT NULL,
    timestamp TEXT NOT NULL,
    skill_name TEXT NOT NULL,
    confidence REAL NOT NULL,
    context_hash TEXT NOT NULL,
    file_patterns TEXT NOT NULL DEFAULT '[]',
    active_agents TEXT NOT NULL DEFAULT '[]',
    strategy TEXT NOT NULL,
    was_activated INTEGER NOT NULL DEFAULT 0,
    was_helpful INTEGER,
    reason TEXT NOT NULL DEFAULT ''
);

-- Outcome reported for a recommendation, at most one per recommendation
CREATE TABLE IF NOT EXISTS recommendation_feedback (
    recommendation_id TEXT PRIMARY KEY NOT NULL,
    helpful INTEGER NOT NULL,
    succeeded INTEGER NOT NULL,
    comment TEXT,
    timestamp TEXT NOT NULL,
    FOREIGN KEY (recommendation_id) REFERENCES recommendations_history(id) ON DELETE CASCADE
);

-- Learned context -> successful skills associations
-- successful_skills, file_patterns and active_agents hold JSON string arrays
CREATE TABLE IF NOT EXISTS context_patterns (
    context_hash TEXT PRIMARY KEY NOT NULL,
    file_patterns TEXT NOT NULL DEFAULT '[]',
    active_agents TEXT NOT NULL DEFAULT '[]',
    successful_skills TEXT NOT NULL DEFAULT '[]',
    observations INTEGER NOT NULL DEFAULT 0,
    successes INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 0,
    last_updated TEXT NOT NULL
);

-- Explicit user ratings
CREATE TABLE IF NOT EXISTS skill_ratings (
    id TEXT PRIMARY KEY NOT NULL,
    skill_name TEXT NOT NULL,
    user_hash TEXT NOT NULL,
    stars INTEGER NOT NULL CHECK (stars BETWEEN 1 AND 5),
    timestamp TEXT NOT NULL,
    project_type TEXT,
    review TEXT,
    was_helpful INTEGER NOT NULL,
    task_succeeded INTEGER NOT NULL
);

-- Aggregates over skill_ratings, recomputed on every insert
CREATE TABLE IF NOT EXISTS skill_quality_metrics (
    skill_name TEXT PRIMARY KEY NOT NULL,
    avg_rating REAL NOT NULL DEFAULT 0,
    total_ratings INTEGER NOT NULL DEFAULT 0,
    helpful_percentage REAL NOT NULL DEFAULT 0,
    success_correlation REAL NOT NULL DEFAULT 0,
    usage_count INTEGER NOT NULL DEFAULT 0,
    stars_5 INTEGER NOT NULL DEFAULT 0,
    stars_4 INTEGER NOT NULL DEFAULT 0,
    stars_3 INTEGER NOT NULL DEFAULT 0,
    stars_2 INTEGER NOT NULL DEFAULT 0,
    stars_1 INTEGER NOT NULL DEFAULT 0,
    last_updated TEXT NOT NULL
);

-- Schema version table for migrations
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Indexes for efficient queries
CREATE INDEX IF NOT EXISTS idx_history_context_skill ON recommendations_history(context_hash, skill_name);
CREATE INDEX IF NOT EXISTS idx_history_timestamp ON recommendations_history(timestamp);
CREATE INDEX IF NOT EXISTS idx_patterns_rate_updated ON context_patterns(success_rate, last_updated);
CREATE INDEX IF NOT EXISTS idx_ratings_skill ON skill_ratings(skill_name);
CREATE INDEX IF NOT EXISTS idx_ratings_project_type ON skill_ratings(project_type);
";
