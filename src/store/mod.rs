//! Persistent store for recommendation history, learned patterns and ratings.
//!
//! Every operation opens its own `SQLite` connection and drops it before
//! returning; nothing holds a handle across calls. Writes run inside
//! `BEGIN IMMEDIATE` transactions and retry on lock contention.

mod error;
mod schema;
mod sqlite;

pub use error::{BusyError, StoreError};
pub use schema::{SCHEMA, SCHEMA_VERSION};
pub use sqlite::{default_store_path, format_timestamp, parse_timestamp, Store, StoreSettings};
