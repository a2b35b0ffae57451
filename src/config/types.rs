//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::{default_store_path, StoreSettings};

use super::ConfigError;

/// Top-level advisor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Ranking and activation settings.
    pub recommend: RecommendConfig,
    /// Pattern learning and retention settings.
    pub patterns: PatternConfig,
    /// Database location and contention handling.
    pub store: StoreConfig,
    /// Path to the rule file. No rules are loaded when unset.
    pub rules_path: Option<PathBuf>,
    /// Path to the agent-skill mapping file. No mappings are loaded when unset.
    pub agents_path: Option<PathBuf>,
}

impl AdvisorConfig {
    /// Check every value is inside its domain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("recommend.auto_activate_threshold", self.recommend.auto_activate_threshold)?;
        check_unit("patterns.success_threshold", self.patterns.success_threshold)?;
        if self.patterns.recent_limit == 0 {
            return Err(ConfigError::invalid("patterns.recent_limit", "must be at least 1"));
        }
        if self.patterns.max_patterns == 0 {
            return Err(ConfigError::invalid("patterns.max_patterns", "must be at least 1"));
        }
        if self.store.max_write_attempts == 0 {
            return Err(ConfigError::invalid("store.max_write_attempts", "must be at least 1"));
        }
        Ok(())
    }
}

fn check_unit(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be within [0, 1], got {value}")))
    }
}

/// Ranking and auto-activation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecommendConfig {
    /// Confidence at or above which a recommendation is auto-activated.
    pub auto_activate_threshold: f64,
    /// Maximum number of recommendations returned; `0` disables the cap.
    pub max_recommendations: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            auto_activate_threshold: 0.8,
            max_recommendations: 10,
        }
    }
}

/// Pattern learner and retention settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatternConfig {
    /// Patterns must have a success rate strictly above this to be used.
    pub success_threshold: f64,
    /// Number of most recently updated patterns consulted per request.
    pub recent_limit: usize,
    /// Patterns not updated for this many days are pruned.
    pub retention_days: u32,
    /// Upper bound on stored patterns after pruning.
    pub max_patterns: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            success_threshold: 0.7,
            recent_limit: 10,
            retention_days: 90,
            max_patterns: 1000,
        }
    }
}

/// Store location and contention settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Busy timeout per statement, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Attempts for a write transaction under contention.
    pub max_write_attempts: u32,
    /// First retry delay in milliseconds, doubled per retry.
    pub backoff_base_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: 250,
            max_write_attempts: 5,
            backoff_base_ms: 20,
        }
    }
}

impl StoreConfig {
    /// Connection settings for [`Store::open`](crate::store::Store::open).
    #[must_use]
    pub fn settings(&self) -> StoreSettings {
        StoreSettings {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            max_write_attempts: self.max_write_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisor_config_defaults() {
        let config = AdvisorConfig::default();
        assert!((config.recommend.auto_activate_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.recommend.max_recommendations, 10);
        assert!((config.patterns.success_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.patterns.recent_limit, 10);
        assert_eq!(config.store.max_write_attempts, 5);
        assert!(config.store.path.ends_with("advisor.db"));
        assert!(config.rules_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            rules_path = "rules.toml"

            [recommend]
            auto_activate_threshold = 0.9

            [patterns]
            retention_days = 30
        "#;
        let config: AdvisorConfig = toml::from_str(toml).unwrap();
        assert!((config.recommend.auto_activate_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.recommend.max_recommendations, 10);
        assert_eq!(config.patterns.retention_days, 30);
        assert_eq!(config.patterns.recent_limit, 10);
        assert_eq!(config.rules_path, Some(PathBuf::from("rules.toml")));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let mut config = AdvisorConfig::default();
        config.recommend.auto_activate_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("auto_activate_threshold"));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = AdvisorConfig::default();
        config.patterns.recent_limit = 0;
        assert!(config.validate().is_err());

        let mut config = AdvisorConfig::default();
        config.store.max_write_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_settings_conversion() {
        let config = StoreConfig {
            busy_timeout_ms: 100,
            backoff_base_ms: 5,
            ..Default::default()
        };
        let settings = config.settings();
        assert_eq!(settings.busy_timeout, Duration::from_millis(100));
        assert_eq!(settings.backoff_base, Duration::from_millis(5));
        assert_eq!(settings.max_write_attempts, 5);
    }
}
