//! Rating and quality-metrics collector.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Result, SkillError};
use crate::store::{format_timestamp, parse_timestamp, Store};

use super::types::{
    ExportReport, NewRating, SkillExport, SkillQualityMetrics, SkillRating, TrustSignal,
};

const METRICS_COLUMNS: &str = "skill_name, avg_rating, total_ratings, helpful_percentage, \
     success_correlation, usage_count, stars_5, stars_4, stars_3, stars_2, stars_1, last_updated";

const RATING_COLUMNS: &str = "id, skill_name, user_hash, stars, timestamp, project_type, review, \
     was_helpful, task_succeeded";

/// Hash of the local user name, truncated to 16 hex characters.
#[must_use]
pub fn local_user_hash() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "anonymous".to_string());
    hash_user(&user)
}

/// Hash an arbitrary user identifier the way ratings store it.
#[must_use]
pub fn hash_user(user: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(user.as_bytes()));
    digest[..16].to_string()
}

fn metrics_from_row(row: &Row<'_>) -> rusqlite::Result<SkillQualityMetrics> {
    let last_updated: String = row.get(11)?;
    Ok(SkillQualityMetrics {
        skill_name: row.get(0)?,
        avg_rating: row.get(1)?,
        total_ratings: row.get(2)?,
        helpful_percentage: row.get(3)?,
        success_correlation: row.get(4)?,
        usage_count: row.get(5)?,
        stars_5: row.get(6)?,
        stars_4: row.get(7)?,
        stars_3: row.get(8)?,
        stars_2: row.get(9)?,
        stars_1: row.get(10)?,
        last_updated: parse_timestamp(&last_updated),
    })
}

fn rating_from_row(row: &Row<'_>) -> rusqlite::Result<SkillRating> {
    let id: String = row.get(0)?;
    let timestamp: String = row.get(4)?;
    Ok(SkillRating {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
        skill_name: row.get(1)?,
        user_hash: row.get(2)?,
        stars: row.get(3)?,
        timestamp: parse_timestamp(&timestamp).unwrap_or_else(Utc::now),
        project_type: row.get(5)?,
        review: row.get(6)?,
        was_helpful: row.get(7)?,
        task_succeeded: row.get(8)?,
    })
}

fn find_metrics(conn: &Connection, skill: &str) -> rusqlite::Result<Option<SkillQualityMetrics>> {
    conn.query_row(
        &format!("SELECT {METRICS_COLUMNS} FROM skill_quality_metrics WHERE skill_name = ?1"),
        params![skill],
        metrics_from_row,
    )
    .optional()
}

fn ratings_for(conn: &Connection, skill: &str) -> rusqlite::Result<Vec<SkillRating>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RATING_COLUMNS} FROM skill_ratings WHERE skill_name = ?1 ORDER BY timestamp ASC, rowid ASC"
    ))?;
    let ratings = stmt
        .query_map(params![skill], rating_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ratings)
}

/// Increment a skill's usage counter, creating its metrics row if needed.
pub(crate) fn bump_usage(conn: &Connection, skill: &str, now: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO skill_quality_metrics (skill_name, usage_count, last_updated)
         VALUES (?1, 1, ?2)
         ON CONFLICT(skill_name) DO UPDATE SET
             usage_count = usage_count + 1,
             last_updated = excluded.last_updated",
        params![skill, format_timestamp(now)],
    )?;
    Ok(())
}

/// Rebuild a skill's rating aggregates from its stored ratings.
/// `usage_count` is left untouched.
#[allow(clippy::cast_precision_loss)]
fn recompute_metrics(conn: &Connection, skill: &str, now: DateTime<Utc>) -> rusqlite::Result<()> {
    let (total, star_sum, helpful, succeeded, s5, s4, s3, s2, s1): (
        u64,
        u64,
        u64,
        u64,
        u64,
        u64,
        u64,
        u64,
        u64,
    ) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(stars), 0),
                COALESCE(SUM(was_helpful), 0),
                COALESCE(SUM(task_succeeded), 0),
                COALESCE(SUM(stars = 5), 0),
                COALESCE(SUM(stars = 4), 0),
                COALESCE(SUM(stars = 3), 0),
                COALESCE(SUM(stars = 2), 0),
                COALESCE(SUM(stars = 1), 0)
         FROM skill_ratings WHERE skill_name = ?1",
        params![skill],
        |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        },
    )?;

    let fraction = |n: u64| if total == 0 { 0.0 } else { n as f64 / total as f64 };

    conn.execute(
        "INSERT INTO skill_quality_metrics
             (skill_name, avg_rating, total_ratings, helpful_percentage, success_correlation,
              usage_count, stars_5, stars_4, stars_3, stars_2, stars_1, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(skill_name) DO UPDATE SET
             avg_rating = excluded.avg_rating,
             total_ratings = excluded.total_ratings,
             helpful_percentage = excluded.helpful_percentage,
             success_correlation = excluded.success_correlation,
             stars_5 = excluded.stars_5,
             stars_4 = excluded.stars_4,
             stars_3 = excluded.stars_3,
             stars_2 = excluded.stars_2,
             stars_1 = excluded.stars_1,
             last_updated = excluded.last_updated",
        params![
            skill,
            fraction(star_sum),
            total,
            fraction(helpful),
            fraction(succeeded),
            s5,
            s4,
            s3,
            s2,
            s1,
            format_timestamp(now),
        ],
    )?;
    Ok(())
}

/// Records explicit star ratings and serves the aggregate quality metrics.
#[derive(Debug, Clone)]
pub struct RatingCollector {
    store: Store,
    user_hash: String,
}

impl RatingCollector {
    /// Collector attributing ratings to the local user.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self::with_user_hash(store, local_user_hash())
    }

    /// Collector attributing ratings to an explicit user hash.
    pub fn with_user_hash(store: Store, user_hash: impl Into<String>) -> Self {
        Self {
            store,
            user_hash: user_hash.into(),
        }
    }

    /// Store a rating and recompute the skill's metrics in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Validation`] for an empty skill name or stars
    /// outside 1..=5 (nothing is written), or [`SkillError::Persistence`].
    pub fn rate(&self, rating: &NewRating) -> Result<SkillRating> {
        let skill = rating.skill.trim();
        if skill.is_empty() {
            return Err(SkillError::Validation("skill name is empty".to_string()));
        }
        if !(1..=5).contains(&rating.stars) {
            return Err(SkillError::Validation(format!(
                "stars must be between 1 and 5, got {}",
                rating.stars
            )));
        }

        let now = Utc::now();
        let stored = SkillRating {
            id: Uuid::new_v4(),
            skill_name: skill.to_string(),
            user_hash: self.user_hash.clone(),
            stars: rating.stars,
            timestamp: now,
            project_type: non_blank(rating.project_type.as_deref()),
            review: non_blank(rating.review.as_deref()),
            was_helpful: rating.helpful,
            task_succeeded: rating.task_succeeded,
        };

        self.store.write(|tx| {
            tx.execute(
                &format!(
                    "INSERT INTO skill_ratings ({RATING_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    stored.id.to_string(),
                    stored.skill_name,
                    stored.user_hash,
                    stored.stars,
                    format_timestamp(now),
                    stored.project_type,
                    stored.review,
                    stored.was_helpful,
                    stored.task_succeeded,
                ],
            )?;
            recompute_metrics(tx, &stored.skill_name, now)?;
            Ok::<_, SkillError>(())
        })?;

        tracing::info!(skill = %stored.skill_name, stars = stored.stars, "Recorded rating");
        Ok(stored)
    }

    /// Current metrics for a skill; zero-valued if it was never rated.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the query fails.
    pub fn get_score(&self, skill: &str) -> Result<SkillQualityMetrics> {
        let skill = skill.trim();
        let metrics = self.store.read(|conn| Ok::<_, SkillError>(find_metrics(conn, skill)?))?;
        Ok(metrics.unwrap_or_else(|| SkillQualityMetrics::empty(skill)))
    }

    /// Trust signal for a skill.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the query fails.
    pub fn trust_signal(&self, skill: &str) -> Result<TrustSignal> {
        Ok(self.get_score(skill)?.trust_signal())
    }

    /// Average ratings of the given skills. Unrated skills are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the query fails.
    pub fn average_ratings<'a>(
        &self,
        skills: impl IntoIterator<Item = &'a str>,
    ) -> Result<BTreeMap<String, f64>> {
        let skills: Vec<&str> = skills.into_iter().collect();
        if skills.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.store.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT avg_rating FROM skill_quality_metrics
                 WHERE skill_name = ?1 AND total_ratings > 0",
            )?;
            let mut averages = BTreeMap::new();
            for skill in skills {
                if let Some(avg) = stmt
                    .query_row(params![skill], |row| row.get::<_, f64>(0))
                    .optional()?
                {
                    averages.insert(skill.to_string(), avg);
                }
            }
            Ok(averages)
        })
    }

    /// Rated skills ordered by average rating, then number of ratings.
    ///
    /// With a `category`, only skills rated at least once under that
    /// project type (case-insensitive) are listed.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the query fails.
    pub fn top_rated(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, SkillQualityMetrics)>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let category = category.map(str::trim).filter(|c| !c.is_empty());

        self.store.read(|conn| {
            let order = "ORDER BY avg_rating DESC, total_ratings DESC, skill_name ASC";
            let metrics = match category {
                Some(category) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {METRICS_COLUMNS} FROM skill_quality_metrics
                         WHERE total_ratings > 0 AND skill_name IN (
                             SELECT skill_name FROM skill_ratings
                             WHERE lower(project_type) = lower(?1)
                         )
                         {order} LIMIT ?2"
                    ))?;
                    let rows = stmt
                        .query_map(params![category, limit], metrics_from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {METRICS_COLUMNS} FROM skill_quality_metrics
                         WHERE total_ratings > 0 {order} LIMIT ?1"
                    ))?;
                    let rows = stmt
                        .query_map(params![limit], metrics_from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(metrics
                .into_iter()
                .map(|m| (m.skill_name.clone(), m))
                .collect())
        })
    }

    /// Every rating of one skill, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the query fails.
    pub fn ratings(&self, skill: &str) -> Result<Vec<SkillRating>> {
        self.store
            .read(|conn| Ok::<_, SkillError>(ratings_for(conn, skill.trim())?))
    }

    /// Dump ratings and metrics for one skill or for every known skill.
    ///
    /// Reads from a single snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`] if the query fails.
    pub fn export(&self, skill: Option<&str>) -> Result<ExportReport> {
        let skills = self.store.read(|conn| {
            let tx = conn.unchecked_transaction()?;
            let names: Vec<String> = match skill.map(str::trim) {
                Some(name) => vec![name.to_string()],
                None => {
                    let mut stmt = tx.prepare(
                        "SELECT skill_name FROM skill_quality_metrics
                         UNION SELECT skill_name FROM skill_ratings
                         ORDER BY skill_name",
                    )?;
                    let names = stmt
                        .query_map([], |row| row.get(0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    names
                }
            };

            let mut skills = Vec::with_capacity(names.len());
            for name in names {
                let metrics =
                    find_metrics(&tx, &name)?.unwrap_or_else(|| SkillQualityMetrics::empty(&name));
                let ratings = ratings_for(&tx, &name)?;
                skills.push(SkillExport {
                    skill_name: name,
                    metrics,
                    ratings,
                });
            }
            tx.commit()?;
            Ok::<_, SkillError>(skills)
        })?;

        Ok(ExportReport {
            generated_at: Utc::now(),
            skills,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
