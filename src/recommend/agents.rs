//! Static agent to skill mapping.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{load_agent_mapping_file, AgentMappingFile, AgentSkillEntry, ConfigError};
use crate::context::NormalizedContext;

use super::types::{SkillRecommendation, StrategyKind};

/// Maps active agents to complementary skills with fixed confidence.
#[derive(Debug, Clone, Default)]
pub struct AgentSkillMapper {
    table: BTreeMap<String, Vec<AgentSkillEntry>>,
}

impl AgentSkillMapper {
    /// A mapper with an empty table.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a mapper from a parsed mapping file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAgentMapping`] for an empty agent id or
    /// skill name, or a confidence outside [0, 1].
    pub fn from_file(file: &AgentMappingFile) -> Result<Self, ConfigError> {
        let mut table = BTreeMap::new();
        for (agent, entries) in &file.agents {
            let invalid = |message: String| ConfigError::InvalidAgentMapping {
                agent: agent.clone(),
                message,
            };
            let agent_id = agent.trim();
            if agent_id.is_empty() {
                return Err(invalid("agent id is empty".to_string()));
            }

            let mut validated = Vec::with_capacity(entries.len());
            for entry in entries {
                let skill = entry.skill.trim();
                if skill.is_empty() {
                    return Err(invalid("skill name is empty".to_string()));
                }
                if !(0.0..=1.0).contains(&entry.confidence) {
                    return Err(invalid(format!(
                        "confidence for '{skill}' must be within [0, 1], got {}",
                        entry.confidence
                    )));
                }
                validated.push(AgentSkillEntry {
                    skill: skill.to_string(),
                    confidence: entry.confidence,
                });
            }
            table.insert(agent_id.to_string(), validated);
        }
        Ok(Self { table })
    }

    /// Load a mapping file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mapper = Self::from_file(&load_agent_mapping_file(path)?)?;
        tracing::info!(path = %path.display(), agents = mapper.table.len(), "Loaded agent mappings");
        Ok(mapper)
    }

    /// Skills mapped to one agent.
    #[must_use]
    pub fn skills_for(&self, agent: &str) -> &[AgentSkillEntry] {
        self.table.get(agent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Emit one candidate per (active agent, mapped skill).
    #[must_use]
    pub fn recommend(&self, ctx: &NormalizedContext) -> Vec<SkillRecommendation> {
        ctx.active_agents
            .iter()
            .flat_map(|agent| {
                self.skills_for(agent).iter().map(move |entry| {
                    SkillRecommendation::new(
                        entry.skill.clone(),
                        entry.confidence,
                        format!("Complements active agent '{agent}'"),
                        StrategyKind::AgentBased,
                    )
                    .with_triggers(vec![format!("agent:{agent}")])
                    .with_related_agents(vec![agent.clone()])
                })
            })
            .collect()
    }
}
