//! Colored CLI display utilities for advisor output.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::feedback::{FeedbackOutcome, FeedbackStats, RecommendationRecord};
use crate::ratings::{SkillQualityMetrics, SkillRating};
use crate::recommend::{EstimatedValue, SkillRecommendation};

/// Truncate a string to a maximum number of characters, adding an ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// Render an average rating as five star glyphs.
#[must_use]
pub fn format_stars(avg: f64) -> String {
    // Rounded to the nearest whole star, clamped to 0..=5.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = avg.round().clamp(0.0, 5.0) as usize;
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

fn percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

/// Print a ranked recommendation list.
pub fn print_recommendations(recs: &[SkillRecommendation]) {
    if recs.is_empty() {
        println!("{}", "No recommendations for this context.".dimmed());
        return;
    }
    for (rank, rec) in recs.iter().enumerate() {
        let value = match rec.estimated_value {
            EstimatedValue::High => rec.estimated_value.as_str().green().to_string(),
            EstimatedValue::Medium => rec.estimated_value.as_str().yellow().to_string(),
            EstimatedValue::Low => rec.estimated_value.as_str().dimmed().to_string(),
        };
        let marker = if rec.auto_activate {
            "[AUTO]".green().bold().to_string()
        } else {
            "[SUGGEST]".cyan().bold().to_string()
        };
        println!(
            "{:>2}. {} {} conf={:.2} value={} via={}",
            rank + 1,
            marker,
            rec.skill_name.bold(),
            rec.confidence,
            value,
            rec.strategy.as_str().dimmed()
        );
        println!("    {}", truncate(&rec.reason, 160).dimmed());
        if !rec.triggers.is_empty() {
            println!("    triggers: {}", truncate(&rec.triggers.join(", "), 120).dimmed());
        }
    }
    let _ = io::stdout().flush();
}

/// Print one stored recommendation record.
pub fn print_record(record: &RecommendationRecord) {
    let helpful = match record.was_helpful {
        Some(true) => "helpful".green().to_string(),
        Some(false) => "not helpful".red().to_string(),
        None => "no feedback".dimmed().to_string(),
    };
    let activated = if record.was_activated {
        "activated".green().to_string()
    } else {
        "surfaced".dimmed().to_string()
    };
    println!(
        "{} {} {} conf={:.2} {} {}",
        record
            .timestamp
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
            .dimmed(),
        record.id.to_string().dimmed(),
        record.skill_name.bold(),
        record.confidence,
        activated,
        helpful
    );
}

/// Print a list of recommendation records.
pub fn print_history(records: &[RecommendationRecord], stats: &FeedbackStats) {
    for record in records {
        print_record(record);
    }
    println!(
        "{} recorded={} activated={} feedback={} helpful={} succeeded={} patterns={}",
        "[STATS]".blue().bold(),
        stats.recorded,
        stats.activated,
        stats.with_feedback,
        stats.helpful,
        stats.succeeded,
        stats.patterns
    );
    let _ = io::stdout().flush();
}

/// Print the result of a feedback submission.
pub fn print_feedback_outcome(outcome: &FeedbackOutcome) {
    println!(
        "{} {} for {}",
        "[FEEDBACK]".green().bold(),
        outcome.record.id,
        outcome.record.skill_name.bold()
    );
    println!(
        "    pattern {} success={} ({}/{}) skills={}",
        truncate(outcome.pattern.context_hash.as_str(), 12).dimmed(),
        percent(outcome.pattern.success_rate),
        outcome.pattern.successes,
        outcome.pattern.observations,
        outcome
            .pattern
            .successful_skills
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );
    let _ = io::stdout().flush();
}

/// Print a stored rating.
pub fn print_rating(rating: &SkillRating) {
    println!(
        "{} {} {}",
        "[RATED]".green().bold(),
        rating.skill_name.bold(),
        format_stars(f64::from(rating.stars)).yellow()
    );
    let _ = io::stdout().flush();
}

/// Print the quality metrics of one skill.
pub fn print_metrics(metrics: &SkillQualityMetrics) {
    if metrics.total_ratings == 0 {
        println!(
            "{} {} (uses: {})",
            metrics.skill_name.bold(),
            "not rated yet".dimmed(),
            metrics.usage_count
        );
        return;
    }
    println!(
        "{} {} {:.2} from {} ratings (uses: {})",
        metrics.skill_name.bold(),
        format_stars(metrics.avg_rating).yellow(),
        metrics.avg_rating,
        metrics.total_ratings,
        metrics.usage_count
    );
    println!(
        "    helpful {}  success {}",
        percent(metrics.helpful_percentage),
        percent(metrics.success_correlation)
    );
    for (stars, count) in (1..=5).rev().zip(metrics.histogram().iter().rev()) {
        println!("    {stars}★ {count}");
    }
    let _ = io::stdout().flush();
}

/// Print a top-rated table.
pub fn print_top_rated(entries: &[(String, SkillQualityMetrics)]) {
    if entries.is_empty() {
        println!("{}", "No rated skills.".dimmed());
        return;
    }
    for (rank, (skill, metrics)) in entries.iter().enumerate() {
        println!(
            "{:>2}. {} {} {:.2} ({} ratings, success {})",
            rank + 1,
            format_stars(metrics.avg_rating).yellow(),
            skill.bold(),
            metrics.avg_rating,
            metrics.total_ratings,
            percent(metrics.success_correlation)
        );
    }
    let _ = io::stdout().flush();
}

/// Print an informational message.
pub fn print_info(message: &str) {
    println!("{} {}", "[INFO]".blue().bold(), message);
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
