//! On-disk schemas for the rule file and the agent-skill mapping file.
//!
//! Rule file:
//!
//! ```toml
//! [[rules]]
//! skill = "owasp-top-10"
//! confidence = 0.9
//! reason = "Security-sensitive files touched: {files}"
//!
//! [rules.trigger]
//! files = ["**/auth/**"]
//! agents = ["security-auditor"]
//! mode = "any"
//! ```
//!
//! Agent mapping file:
//!
//! ```toml
//! [[agents.security-auditor]]
//! skill = "owasp-top-10"
//! confidence = 0.85
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::recommend::EstimatedValue;

/// Parsed rule file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleFile {
    /// Rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// One declarative rule as written in the rule file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleDefinition {
    /// Skill recommended when the rule fires.
    pub skill: String,
    /// Static confidence in [0, 1].
    pub confidence: f64,
    /// Reason template. Supports `{skill}`, `{files}`, `{agents}`, `{project_type}`.
    #[serde(default)]
    pub reason: String,
    /// Optional override for the estimated value.
    #[serde(default)]
    pub estimated_value: Option<EstimatedValue>,
    /// When the rule fires.
    pub trigger: TriggerDefinition,
}

/// Trigger predicate of a rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerDefinition {
    /// Glob patterns matched against touched file paths.
    #[serde(default)]
    pub files: Vec<String>,
    /// Agent ids that must be active.
    #[serde(default)]
    pub agents: Vec<String>,
    /// Project types the rule applies to.
    #[serde(default)]
    pub project_types: Vec<String>,
    /// How the individual conditions combine.
    #[serde(default)]
    pub mode: TriggerMode,
}

/// How trigger conditions combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Any listed condition group matching fires the rule.
    #[default]
    Any,
    /// Every non-empty condition group must match.
    All,
}

/// Parsed agent-skill mapping file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentMappingFile {
    /// Complementary skills per agent id.
    #[serde(default)]
    pub agents: BTreeMap<String, Vec<AgentSkillEntry>>,
}

/// One complementary skill for an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSkillEntry {
    /// Skill name.
    pub skill: String,
    /// Fixed confidence in [0, 1].
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_file() {
        let toml = r#"
            [[rules]]
            skill = "owasp-top-10"
            confidence = 0.9
            reason = "Auth code touched: {files}"

            [rules.trigger]
            files = ["**/auth/**"]

            [[rules]]
            skill = "react-patterns"
            confidence = 0.6
            estimated_value = "medium"

            [rules.trigger]
            files = ["**/*.tsx"]
            agents = ["frontend-developer"]
            mode = "all"
        "#;
        let file: RuleFile = toml::from_str(toml).unwrap();
        assert_eq!(file.rules.len(), 2);
        assert_eq!(file.rules[0].trigger.mode, TriggerMode::Any);
        assert_eq!(file.rules[1].trigger.mode, TriggerMode::All);
        assert_eq!(file.rules[1].estimated_value, Some(EstimatedValue::Medium));
        assert!(file.rules[1].reason.is_empty());
    }

    #[test]
    fn test_rule_requires_trigger_table() {
        let toml = r#"
            [[rules]]
            skill = "x"
            confidence = 0.5
        "#;
        assert!(toml::from_str::<RuleFile>(toml).is_err());
    }

    #[test]
    fn test_parse_agent_mapping_file() {
        let toml = r#"
            [[agents.security-auditor]]
            skill = "owasp-top-10"
            confidence = 0.85

            [[agents.security-auditor]]
            skill = "secure-coding"
            confidence = 0.7

            [[agents.python-pro]]
            skill = "python-testing"
            confidence = 0.8
        "#;
        let file: AgentMappingFile = toml::from_str(toml).unwrap();
        assert_eq!(file.agents.len(), 2);
        assert_eq!(file.agents["security-auditor"].len(), 2);
        assert_eq!(file.agents["python-pro"][0].skill, "python-testing");
    }

    #[test]
    fn test_empty_files_parse() {
        assert!(toml::from_str::<RuleFile>("").unwrap().rules.is_empty());
        assert!(toml::from_str::<AgentMappingFile>("").unwrap().agents.is_empty());
    }
}
