//! Session context snapshots and their stable identity.
//!
//! A [`SessionContext`] is what the caller observed about the current
//! session. It is normalized into a [`NormalizedContext`] whose
//! [`ContextHash`] keys learned patterns in the store.

mod hasher;
mod types;

pub use hasher::{file_pattern, hash_normalized, ContextHash, HASH_HEX_LEN};
pub use types::{NormalizedContext, SessionContext};
