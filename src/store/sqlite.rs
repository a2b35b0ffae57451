//! `SQLite` store with per-operation connections.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::error::{BusyError, StoreError};
use super::schema::{SCHEMA, SCHEMA_VERSION};

/// Returns the default path for the advisor database.
///
/// This is `~/.local/share/skill-advisor/advisor.db` on Unix systems.
#[must_use]
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skill-advisor")
        .join("advisor.db")
}

/// Format a timestamp for storage.
///
/// Always UTC with microseconds and a `Z` suffix, so stored values sort
/// lexicographically in time order.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored RFC 3339 timestamp.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Connection and retry tuning for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// How long a single statement waits on a lock before reporting busy.
    pub busy_timeout: Duration,
    /// Total attempts for a write transaction before giving up.
    pub max_write_attempts: u32,
    /// Delay before the first retry; doubled on every further retry.
    pub backoff_base: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(250),
            max_write_attempts: 5,
            backoff_base: Duration::from_millis(20),
        }
    }
}

/// Handle to the advisor database.
///
/// Holds only the location and settings. Cloning is cheap and clones share
/// nothing but the file on disk, so an interactive session and a background
/// hook can each hold their own `Store`.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    settings: StoreSettings,
}

impl Store {
    /// Open the store at `path`, creating parent directories and applying the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the database cannot be
    /// opened, or the schema cannot be applied within the retry budget.
    pub fn open(path: impl AsRef<Path>, settings: StoreSettings) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let store = Self { path, settings };
        store.retry(|| -> Result<(), StoreError> {
            let conn = store.connect()?;
            conn.execute_batch(SCHEMA)?;
            conn.execute(
                "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
            Ok(())
        })?;

        tracing::debug!(path = %store.path.display(), "Opened advisor store");
        Ok(store)
    }

    /// Returns the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the connection settings.
    #[must_use]
    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path).map_err(|source| StoreError::DatabaseOpen {
            path: self.path.clone(),
            source,
        })?;
        conn.busy_timeout(self.settings.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(conn)
    }

    /// Run a read-only operation on a fresh connection.
    ///
    /// Readers rely on the busy timeout and are not retried.
    ///
    /// # Errors
    ///
    /// Returns whatever `op` returns, or a store error if the connection fails.
    pub fn read<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<StoreError>,
    {
        let conn = self.connect()?;
        op(&conn)
    }

    /// Run `op` inside one immediate transaction on a fresh connection.
    ///
    /// The transaction commits only if `op` returns `Ok`; any error or panic
    /// rolls it back when the transaction is dropped. Lock contention is
    /// retried with exponential backoff, so `op` may run more than once and
    /// must not have effects outside the transaction.
    ///
    /// # Errors
    ///
    /// Returns the error from `op`, or [`StoreError::Contention`] once the
    /// retry budget is spent.
    pub fn write<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(&Transaction<'_>) -> Result<T, E>,
        E: From<StoreError> + BusyError,
    {
        self.retry(|| {
            let mut conn = self.connect()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::from)?;
            let value = op(&tx)?;
            tx.commit().map_err(StoreError::from)?;
            Ok(value)
        })
    }

    fn retry<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: From<StoreError> + BusyError,
    {
        let max_attempts = self.settings.max_write_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let source = err.into_busy()?;
            if attempt >= max_attempts {
                tracing::warn!(attempts = attempt, error = %source, "Store lock contention exhausted retries");
                return Err(E::from(StoreError::Contention {
                    attempts: attempt,
                    source,
                }));
            }

            let delay = self.settings.backoff_base * 2u32.saturating_pow(attempt - 1);
            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %source,
                "Store is locked, retrying"
            );
            std::thread::sleep(delay);
            attempt += 1;
        }
    }
}
