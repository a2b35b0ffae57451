//! Session context types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::hasher::{file_pattern, hash_normalized, ContextHash};

/// Snapshot of the current development session, supplied by the caller.
///
/// File existence is never checked; the list is consumed as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Paths touched during the session.
    #[serde(default)]
    pub touched_files: Vec<String>,
    /// Identifiers of the agents currently active.
    #[serde(default)]
    pub active_agents: Vec<String>,
    /// Free-form project type tag (e.g. `python`, `rust`).
    #[serde(default)]
    pub project_type: String,
}

impl SessionContext {
    /// Create an empty context for the given project type.
    pub fn new(project_type: impl Into<String>) -> Self {
        Self {
            touched_files: Vec::new(),
            active_agents: Vec::new(),
            project_type: project_type.into(),
        }
    }

    /// Add a touched file path.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.touched_files.push(path.into());
        self
    }

    /// Add an active agent id.
    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.active_agents.push(agent.into());
        self
    }

    /// Normalize this context: sort and de-duplicate every list, derive the
    /// file-extension patterns and compute the context hash.
    #[must_use]
    pub fn normalize(&self) -> NormalizedContext {
        let files: BTreeSet<String> = self
            .touched_files
            .iter()
            .map(|f| f.trim().replace('\\', "/"))
            .filter(|f| !f.is_empty())
            .collect();
        let file_patterns: BTreeSet<String> = files.iter().filter_map(|f| file_pattern(f)).collect();
        let active_agents: BTreeSet<String> = self
            .active_agents
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let file_patterns: Vec<String> = file_patterns.into_iter().collect();
        let active_agents: Vec<String> = active_agents.into_iter().collect();
        let hash = hash_normalized(&file_patterns, &active_agents);

        NormalizedContext {
            files: files.into_iter().collect(),
            file_patterns,
            active_agents,
            project_type: self.project_type.trim().to_string(),
            hash,
        }
    }
}

/// A context after normalization. Every list is sorted and distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedContext {
    /// Distinct touched paths with `/` separators.
    pub files: Vec<String>,
    /// Distinct file-extension patterns such as `*.py`.
    pub file_patterns: Vec<String>,
    /// Distinct active agent ids.
    pub active_agents: Vec<String>,
    /// Trimmed project type tag.
    pub project_type: String,
    /// Identity of this context for pattern lookup.
    pub hash: ContextHash,
}

impl NormalizedContext {
    /// Whether the given agent is active.
    #[must_use]
    pub fn has_agent(&self, agent: &str) -> bool {
        self.active_agents.binary_search_by(|a| a.as_str().cmp(agent)).is_ok()
    }

    /// Whether the context carries no files and no agents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.active_agents.is_empty()
    }
}
