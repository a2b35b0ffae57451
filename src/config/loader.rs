//! Configuration file loader.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::{AdvisorConfig, AgentMappingFile, RuleFile};

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .skill-advisor.toml
        search_paths.push(PathBuf::from(".skill-advisor.toml"));

        // 2. User config directory: ~/.config/skill-advisor/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("skill-advisor").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// Relative `rules_path` and `agents_path` values are resolved against
    /// the directory of the file they were read from.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or holds
    /// out-of-range values.
    pub fn load(&self) -> Result<AdvisorConfig, ConfigError> {
        for path in &self.search_paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config file");
                let mut config: AdvisorConfig = load_toml(path)?;
                if let Some(base) = path.parent() {
                    config.rules_path = config.rules_path.map(|p| resolve(base, p));
                    config.agents_path = config.agents_path.map(|p| resolve(base, p));
                }
                config.validate()?;
                return Ok(config);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(AdvisorConfig::default())
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}

/// Read and parse a TOML file.
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] or [`ConfigError::ParseError`].
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load a rule file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed. Semantic checks
/// happen when the rules are compiled.
pub fn load_rule_file(path: &Path) -> Result<RuleFile, ConfigError> {
    tracing::debug!(path = %path.display(), "Loading rule file");
    load_toml(path)
}

/// Load an agent-skill mapping file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_agent_mapping_file(path: &Path) -> Result<AgentMappingFile, ConfigError> {
    tracing::debug!(path = %path.display(), "Loading agent mapping file");
    load_toml(path)
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config value {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid rule #{index} ({skill}): {message}")]
    InvalidRule {
        index: usize,
        skill: String,
        message: String,
    },

    #[error("Invalid mapping for agent '{agent}': {message}")]
    InvalidAgentMapping { agent: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
