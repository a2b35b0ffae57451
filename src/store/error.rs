//! Store error types.

use std::path::PathBuf;

use rusqlite::ErrorCode;

/// Errors that can occur during store operations.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Failed to open or create database.
    #[error("Failed to open database at {path}: {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to execute SQL.
    #[error("Database query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// Failed to serialize data to JSON.
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failed to create parent directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database stayed locked for the whole retry budget.
    #[error("Database locked after {attempts} attempts: {source}")]
    Contention {
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },
}

/// Errors that can tell whether they were caused by `SQLite` lock contention.
///
/// Write closures passed to [`Store::write`](super::Store::write) return an
/// error implementing this trait so the store knows when a retry is worth it.
pub trait BusyError {
    /// Whether this error is transient lock contention.
    fn is_busy(&self) -> bool;

    /// The underlying `SQLite` error if this is lock contention, else `self`.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged when the error is not lock contention.
    fn into_busy(self) -> Result<rusqlite::Error, Self>
    where
        Self: Sized;
}

/// Whether a raw `SQLite` error is `SQLITE_BUSY` or `SQLITE_LOCKED`.
pub(crate) fn is_busy_sqlite(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

impl BusyError for StoreError {
    fn is_busy(&self) -> bool {
        match self {
            Self::Query(err) | Self::DatabaseOpen { source: err, .. } => is_busy_sqlite(err),
            _ => false,
        }
    }

    fn into_busy(self) -> Result<rusqlite::Error, Self> {
        match self {
            Self::Query(err) | Self::DatabaseOpen { source: err, .. } if is_busy_sqlite(&err) => {
                Ok(err)
            }
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_error(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), Some("test".to_string()))
    }

    #[test]
    fn test_database_open_display() {
        let err = StoreError::DatabaseOpen {
            path: PathBuf::from("/tmp/advisor.db"),
            source: sqlite_error(1),
        };
        assert!(err.to_string().contains("Failed to open database"));
        assert!(err.to_string().contains("/tmp/advisor.db"));
    }

    #[test]
    fn test_create_dir_display() {
        let err = StoreError::CreateDir {
            path: PathBuf::from("/root/advisor"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("Failed to create directory"));
        assert!(err.to_string().contains("/root/advisor"));
    }

    #[test]
    fn test_contention_display() {
        let err = StoreError::Contention {
            attempts: 5,
            source: sqlite_error(rusqlite::ffi::SQLITE_BUSY),
        };
        assert!(err.to_string().contains("after 5 attempts"));
        assert!(!err.is_busy());
    }

    #[test]
    fn test_busy_classification() {
        assert!(StoreError::Query(sqlite_error(rusqlite::ffi::SQLITE_BUSY)).is_busy());
        assert!(StoreError::Query(sqlite_error(rusqlite::ffi::SQLITE_LOCKED)).is_busy());
        assert!(!StoreError::Query(sqlite_error(rusqlite::ffi::SQLITE_CONSTRAINT)).is_busy());
        assert!(!StoreError::Query(rusqlite::Error::QueryReturnedNoRows).is_busy());
    }

    #[test]
    fn test_into_busy_keeps_sqlite_error() {
        let source = StoreError::Query(sqlite_error(rusqlite::ffi::SQLITE_LOCKED))
            .into_busy()
            .unwrap();
        assert_eq!(source.sqlite_error_code(), Some(ErrorCode::DatabaseLocked));

        let not_busy = StoreError::Query(rusqlite::Error::QueryReturnedNoRows).into_busy();
        assert!(matches!(not_busy, Err(StoreError::Query(rusqlite::Error::QueryReturnedNoRows))));
    }
}
