//! Crate-level error type.

use uuid::Uuid;

use crate::config::ConfigError;
use crate::store::{BusyError, StoreError};

/// Errors surfaced by advisor operations.
#[derive(thiserror::Error, Debug)]
pub enum SkillError {
    /// Malformed configuration, rule file or agent mapping. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A caller-supplied value is outside its domain.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Feedback was submitted for an unknown recommendation.
    #[error("Recommendation not found: {0}")]
    NotFound(Uuid),

    /// Feedback for this recommendation was already recorded.
    #[error("Feedback already recorded for recommendation {0}")]
    AlreadyRecorded(Uuid),

    /// The store failed or stayed locked past the retry budget.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl From<rusqlite::Error> for SkillError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence(StoreError::Query(err))
    }
}

impl From<serde_json::Error> for SkillError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(StoreError::Serialize(err))
    }
}

impl BusyError for SkillError {
    fn is_busy(&self) -> bool {
        match self {
            Self::Persistence(err) => err.is_busy(),
            _ => false,
        }
    }

    fn into_busy(self) -> std::result::Result<rusqlite::Error, Self> {
        match self {
            Self::Persistence(err) => err.into_busy().map_err(Self::Persistence),
            other => Err(other),
        }
    }
}

/// Convenience alias for advisor results.
pub type Result<T, E = SkillError> = std::result::Result<T, E>;
