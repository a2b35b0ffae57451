//! Deterministic context hashing.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest (128 bits).
pub const HASH_HEX_LEN: usize = 32;

/// Stable identity of a normalized session context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextHash(String);

impl ContextHash {
    /// Wrap an already computed hex digest, e.g. one read back from the store.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reduce a path to its file-extension pattern.
///
/// `src/auth/login.py` becomes `*.py`; files without an extension keep
/// their bare name (`Makefile`, `.env`). Returns `None` for paths with no
/// file name component.
#[must_use]
pub fn file_pattern(path: &str) -> Option<String> {
    let path = Path::new(path);
    let name = path.file_name()?.to_str()?;
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => Some(format!("*.{}", ext.to_lowercase())),
        _ => Some(name.to_string()),
    }
}

/// Hash already sorted, distinct file patterns and agent ids.
///
/// Pure and free of I/O. Both lists are length-prefixed so that moving an
/// entry from one list to the other always changes the digest.
#[must_use]
pub fn hash_normalized(file_patterns: &[String], active_agents: &[String]) -> ContextHash {
    let mut hasher = Sha256::new();
    for (label, items) in [("files", file_patterns), ("agents", active_agents)] {
        hasher.update(label.as_bytes());
        hasher.update((items.len() as u64).to_le_bytes());
        for item in items {
            hasher.update((item.len() as u64).to_le_bytes());
            hasher.update(item.as_bytes());
        }
    }
    let digest = format!("{:x}", hasher.finalize());
    ContextHash(digest[..HASH_HEX_LEN].to_string())
}
