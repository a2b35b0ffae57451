//! Storage of learned context patterns.
//!
//! `file_patterns`, `active_agents` and `successful_skills` are stored as
//! JSON arrays of strings (`["*.py","*.rs"]`). Rows are read raw and decoded
//! separately so a single corrupt payload can be skipped without failing the
//! whole query.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::context::ContextHash;
use crate::store::{format_timestamp, parse_timestamp};

use super::types::ContextPattern;

const PATTERN_COLUMNS: &str = "context_hash, file_patterns, active_agents, successful_skills, \
     observations, successes, success_rate, last_updated";

/// Why a stored pattern row could not be decoded.
#[derive(thiserror::Error, Debug)]
pub enum PatternDecodeError {
    /// A JSON list column is not an array of strings.
    #[error("column {column} is not a JSON string array: {source}")]
    Json {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// `last_updated` is not an RFC 3339 timestamp.
    #[error("invalid last_updated timestamp '{0}'")]
    Timestamp(String),
}

/// Encode a string list for a JSON list column.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_list<'a>(items: impl IntoIterator<Item = &'a String>) -> Result<String, serde_json::Error> {
    serde_json::to_string(&items.into_iter().collect::<Vec<_>>())
}

/// Decode a JSON list column.
///
/// # Errors
///
/// Returns an error if the payload is not a JSON array of strings.
pub fn decode_list(payload: &str) -> Result<Vec<String>, serde_json::Error> {
    serde_json::from_str(payload)
}

/// A `context_patterns` row before its JSON columns are decoded.
#[derive(Debug, Clone)]
pub struct RawPatternRow {
    pub context_hash: String,
    pub file_patterns: String,
    pub active_agents: String,
    pub successful_skills: String,
    pub observations: u64,
    pub successes: u64,
    pub success_rate: f64,
    pub last_updated: String,
}

impl RawPatternRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            context_hash: row.get(0)?,
            file_patterns: row.get(1)?,
            active_agents: row.get(2)?,
            successful_skills: row.get(3)?,
            observations: row.get(4)?,
            successes: row.get(5)?,
            success_rate: row.get(6)?,
            last_updated: row.get(7)?,
        })
    }

    /// Decode the JSON columns and timestamp.
    ///
    /// # Errors
    ///
    /// Returns the first column that fails to decode.
    pub fn decode(&self) -> Result<ContextPattern, PatternDecodeError> {
        let list = |column: &'static str, payload: &str| {
            decode_list(payload).map_err(|source| PatternDecodeError::Json { column, source })
        };
        Ok(ContextPattern {
            context_hash: ContextHash::from_hex(self.context_hash.clone()),
            file_patterns: list("file_patterns", &self.file_patterns)?,
            active_agents: list("active_agents", &self.active_agents)?,
            successful_skills: list("successful_skills", &self.successful_skills)?
                .into_iter()
                .collect(),
            observations: self.observations,
            successes: self.successes,
            success_rate: self.success_rate,
            last_updated: parse_timestamp(&self.last_updated)
                .ok_or_else(|| PatternDecodeError::Timestamp(self.last_updated.clone()))?,
        })
    }
}

/// Fetch one raw pattern row.
pub(crate) fn find_raw(conn: &Connection, hash: &ContextHash) -> rusqlite::Result<Option<RawPatternRow>> {
    conn.query_row(
        &format!("SELECT {PATTERN_COLUMNS} FROM context_patterns WHERE context_hash = ?1"),
        params![hash.as_str()],
        RawPatternRow::from_row,
    )
    .optional()
}

/// Most recently updated rows with a success rate strictly above `threshold`.
pub(crate) fn recent_successful(
    conn: &Connection,
    threshold: f64,
    limit: usize,
) -> rusqlite::Result<Vec<RawPatternRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATTERN_COLUMNS} FROM context_patterns
         WHERE success_rate > ?1
         ORDER BY last_updated DESC, context_hash ASC
         LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(
            params![threshold, i64::try_from(limit).unwrap_or(i64::MAX)],
            RawPatternRow::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Record one outcome for a context, creating the pattern if it is new.
///
/// Increments `observations`, increments `successes` and adds `skill` to the
/// successful set when `succeeded`, then recomputes the success rate. A
/// corrupt skill list on an existing row is logged and the pattern restarts
/// from this observation, counters included.
pub(crate) fn record_observation(
    conn: &Connection,
    hash: &ContextHash,
    file_patterns: &[String],
    active_agents: &[String],
    skill: &str,
    succeeded: bool,
    now: DateTime<Utc>,
) -> Result<ContextPattern, crate::error::SkillError> {
    let existing = find_raw(conn, hash)?;

    let (mut skills, observations, successes) = match &existing {
        Some(raw) => match decode_list(&raw.successful_skills) {
            Ok(list) => (list.into_iter().collect(), raw.observations, raw.successes),
            Err(err) => {
                tracing::warn!(
                    context_hash = %hash,
                    error = %err,
                    observations = raw.observations,
                    "Corrupt successful_skills payload, restarting pattern"
                );
                (BTreeSet::new(), 0, 0)
            }
        },
        None => (BTreeSet::new(), 0, 0),
    };

    let observations = observations + 1;
    let successes = successes + u64::from(succeeded);
    if succeeded {
        skills.insert(skill.to_string());
    }
    #[allow(clippy::cast_precision_loss)]
    let success_rate = successes as f64 / observations as f64;

    conn.execute(
        "INSERT INTO context_patterns
             (context_hash, file_patterns, active_agents, successful_skills,
              observations, successes, success_rate, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(context_hash) DO UPDATE SET
             file_patterns = excluded.file_patterns,
             active_agents = excluded.active_agents,
             successful_skills = excluded.successful_skills,
             observations = excluded.observations,
             successes = excluded.successes,
             success_rate = excluded.success_rate,
             last_updated = excluded.last_updated",
        params![
            hash.as_str(),
            encode_list(file_patterns)?,
            encode_list(active_agents)?,
            encode_list(&skills)?,
            observations,
            successes,
            success_rate,
            format_timestamp(now),
        ],
    )?;

    Ok(ContextPattern {
        context_hash: hash.clone(),
        file_patterns: file_patterns.to_vec(),
        active_agents: active_agents.to_vec(),
        successful_skills: skills,
        observations,
        successes,
        success_rate,
        last_updated: now,
    })
}

/// Delete patterns older than the retention window, then trim to the
/// `max_patterns` most recently updated rows. Returns the rows removed.
pub(crate) fn prune(
    conn: &Connection,
    retention_days: u32,
    max_patterns: usize,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let cutoff = format_timestamp(now - Duration::days(i64::from(retention_days)));
    let expired = conn.execute(
        "DELETE FROM context_patterns WHERE last_updated < ?1",
        params![cutoff],
    )?;
    let overflow = conn.execute(
        "DELETE FROM context_patterns WHERE context_hash NOT IN (
             SELECT context_hash FROM context_patterns
             ORDER BY last_updated DESC, context_hash ASC
             LIMIT ?1
         )",
        params![i64::try_from(max_patterns).unwrap_or(i64::MAX)],
    )?;
    Ok(expired + overflow)
}
