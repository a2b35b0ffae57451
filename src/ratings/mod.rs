//! Explicit star ratings and per-skill quality metrics.

mod collector;
mod types;

pub use collector::{hash_user, local_user_hash, RatingCollector};
pub use types::*;

pub(crate) use collector::bump_usage;
