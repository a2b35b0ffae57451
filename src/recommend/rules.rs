//! Declarative rule engine.
//!
//! Rules are compiled once from a [`RuleFile`]; compile errors are
//! configuration errors and stop loading. Evaluation is pure, so a
//! [`RuleEngine`] can be shared freely across threads.

use std::path::Path;

use glob::{MatchOptions, Pattern};
use regex::Regex;

use crate::config::{load_rule_file, ConfigError, RuleDefinition, RuleFile, TriggerMode};
use crate::context::NormalizedContext;

use super::types::{EstimatedValue, SkillRecommendation, StrategyKind};

/// Placeholders a reason template may use.
const KNOWN_PLACEHOLDERS: [&str; 4] = ["skill", "files", "agents", "project_type"];

/// Matched files listed in a reason before the rest are summarized.
const MAX_LISTED_FILES: usize = 3;

/// Matches `{name}` placeholders in reason templates.
const PLACEHOLDER_PATTERN: &str = r"\{([A-Za-z_]+)\}";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A validated rule ready for evaluation.
#[derive(Debug, Clone)]
pub struct Rule {
    skill: String,
    confidence: f64,
    reason_template: String,
    estimated_value: Option<EstimatedValue>,
    file_patterns: Vec<Pattern>,
    agents: Vec<String>,
    project_types: Vec<String>,
    mode: TriggerMode,
    placeholders: Regex,
}

impl Rule {
    /// Validate and compile one rule definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRule`] for an empty skill name, a confidence
    /// outside [0, 1], a trigger without conditions, an invalid glob, or an
    /// unknown reason placeholder.
    pub fn compile(index: usize, def: &RuleDefinition) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidRule {
            index,
            skill: def.skill.clone(),
            message,
        };

        let skill = def.skill.trim();
        if skill.is_empty() {
            return Err(invalid("skill name is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&def.confidence) {
            return Err(invalid(format!(
                "confidence must be within [0, 1], got {}",
                def.confidence
            )));
        }

        let trigger = &def.trigger;
        if trigger.files.is_empty() && trigger.agents.is_empty() && trigger.project_types.is_empty()
        {
            return Err(invalid("trigger has no conditions".to_string()));
        }

        let file_patterns = trigger
            .files
            .iter()
            .map(|p| Pattern::new(p).map_err(|e| invalid(format!("invalid glob '{p}': {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        let placeholders = Regex::new(PLACEHOLDER_PATTERN)
            .map_err(|e| invalid(format!("invalid placeholder pattern: {e}")))?;
        for caps in placeholders.captures_iter(&def.reason) {
            let name = &caps[1];
            if !KNOWN_PLACEHOLDERS.contains(&name) {
                return Err(invalid(format!("unknown placeholder '{{{name}}}' in reason")));
            }
        }

        Ok(Self {
            skill: skill.to_string(),
            confidence: def.confidence,
            reason_template: def.reason.clone(),
            estimated_value: def.estimated_value,
            file_patterns,
            agents: trigger.agents.iter().map(|a| a.trim().to_string()).collect(),
            project_types: trigger.project_types.iter().map(|p| p.to_lowercase()).collect(),
            mode: trigger.mode,
            placeholders,
        })
    }

    /// Skill this rule recommends.
    #[must_use]
    pub fn skill(&self) -> &str {
        &self.skill
    }

    /// Evaluate the rule against a context.
    #[must_use]
    pub fn evaluate(&self, ctx: &NormalizedContext) -> Option<SkillRecommendation> {
        let mut triggers = Vec::new();

        let mut matched_files = Vec::new();
        for pattern in &self.file_patterns {
            let hits: Vec<&String> = ctx
                .files
                .iter()
                .filter(|f| pattern.matches_with(f, MATCH_OPTIONS))
                .collect();
            if !hits.is_empty() {
                triggers.push(pattern.as_str().to_string());
                matched_files.extend(hits);
            }
        }
        matched_files.sort();
        matched_files.dedup();

        let matched_agents: Vec<String> = self
            .agents
            .iter()
            .filter(|a| ctx.has_agent(a))
            .cloned()
            .collect();
        triggers.extend(matched_agents.iter().map(|a| format!("agent:{a}")));

        let project_matched = !ctx.project_type.is_empty()
            && self.project_types.contains(&ctx.project_type.to_lowercase());
        if project_matched {
            triggers.push(format!("project:{}", ctx.project_type));
        }

        let groups = [
            (!self.file_patterns.is_empty(), !matched_files.is_empty()),
            (!self.agents.is_empty(), !matched_agents.is_empty()),
            (!self.project_types.is_empty(), project_matched),
        ];
        let fired = match self.mode {
            TriggerMode::Any => groups.iter().any(|&(present, hit)| present && hit),
            TriggerMode::All => groups.iter().all(|&(present, hit)| !present || hit),
        };
        if !fired {
            return None;
        }

        let reason = self.render_reason(&matched_files, &matched_agents, ctx, &triggers);
        let mut rec = SkillRecommendation::new(
            self.skill.clone(),
            self.confidence,
            reason,
            StrategyKind::RuleBased,
        )
        .with_triggers(triggers)
        .with_related_agents(matched_agents);
        if let Some(value) = self.estimated_value {
            rec = rec.with_estimated_value(value);
        }
        Some(rec)
    }

    fn render_reason(
        &self,
        files: &[&String],
        agents: &[String],
        ctx: &NormalizedContext,
        triggers: &[String],
    ) -> String {
        if self.reason_template.trim().is_empty() {
            return format!("Rule matched: {}", triggers.join(", "));
        }

        let extra = files.len().saturating_sub(MAX_LISTED_FILES);
        let more = format!("and {extra} more");
        let mut listed: Vec<&str> = files.iter().take(MAX_LISTED_FILES).map(|f| f.as_str()).collect();
        if extra > 0 {
            listed.push(&more);
        }

        self.placeholders
            .replace_all(&self.reason_template, |caps: &regex::Captures<'_>| {
                match &caps[1] {
                    "skill" => self.skill.clone(),
                    "files" => listed.join(", "),
                    "agents" => agents.join(", "),
                    "project_type" => ctx.project_type.clone(),
                    other => format!("{{{other}}}"),
                }
            })
            .into_owned()
    }
}

/// Ordered set of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    /// An engine with no rules.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile every rule in a parsed rule file.
    ///
    /// # Errors
    ///
    /// Returns the first rule that fails validation; malformed rules are never skipped.
    pub fn from_file(file: &RuleFile) -> Result<Self, ConfigError> {
        let rules = file
            .rules
            .iter()
            .enumerate()
            .map(|(i, def)| Rule::compile(i, def))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Load and compile a rule file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let engine = Self::from_file(&load_rule_file(path)?)?;
        tracing::info!(path = %path.display(), rules = engine.len(), "Loaded rules");
        Ok(engine)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the engine has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule in order. The same skill may appear several times.
    #[must_use]
    pub fn evaluate(&self, ctx: &NormalizedContext) -> Vec<SkillRecommendation> {
        let recs: Vec<SkillRecommendation> =
            self.rules.iter().filter_map(|r| r.evaluate(ctx)).collect();
        tracing::debug!(context_hash = %ctx.hash, fired = recs.len(), "Evaluated rules");
        recs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriggerDefinition;
    use crate::context::SessionContext;

    fn rule(skill: &str, confidence: f64, files: &[&str], agents: &[&str]) -> RuleDefinition {
        RuleDefinition {
            skill: skill.to_string(),
            confidence,
            reason: String::new(),
            estimated_value: None,
            trigger: TriggerDefinition {
                files: files.iter().map(ToString::to_string).collect(),
                agents: agents.iter().map(ToString::to_string).collect(),
                ..Default::default()
            },
        }
    }

    fn engine(rules: Vec<RuleDefinition>) -> RuleEngine {
        RuleEngine::from_file(&RuleFile { rules }).unwrap()
    }

    #[test]
    fn test_auth_glob_fires() {
        let engine = engine(vec![rule("owasp-top-10", 0.9, &["**/auth/**"], &[])]);
        let ctx = SessionContext::new("python")
            .with_file("src/auth/login.py")
            .normalize();

        let recs = engine.evaluate(&ctx);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].skill_name, "owasp-top-10");
        assert!((recs[0].confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(recs[0].strategy, StrategyKind::RuleBased);
        assert_eq!(recs[0].triggers, vec!["**/auth/**"]);
    }

    #[test]
    fn test_no_match_no_recommendation() {
        let engine = engine(vec![rule("owasp-top-10", 0.9, &["**/auth/**"], &[])]);
        let ctx = SessionContext::new("").with_file("src/ui/button.tsx").normalize();
        assert!(engine.evaluate(&ctx).is_empty());
    }

    #[test]
    fn test_agent_trigger() {
        let engine = engine(vec![rule("secure-coding", 0.7, &[], &["security-auditor"])]);
        let ctx = SessionContext::new("").with_agent("security-auditor").normalize();

        let recs = engine.evaluate(&ctx);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].related_agents, vec!["security-auditor"]);
        assert!(recs[0].triggers.contains(&"agent:security-auditor".to_string()));
    }

    #[test]
    fn test_all_mode_requires_every_group() {
        let mut def = rule("react-patterns", 0.6, &["**/*.tsx"], &["frontend-developer"]);
        def.trigger.mode = TriggerMode::All;
        let engine = engine(vec![def]);

        let only_files = SessionContext::new("").with_file("web/App.tsx").normalize();
        assert!(engine.evaluate(&only_files).is_empty());

        let both = SessionContext::new("")
            .with_file("web/App.tsx")
            .with_agent("frontend-developer")
            .normalize();
        assert_eq!(engine.evaluate(&both).len(), 1);
    }

    #[test]
    fn test_project_type_trigger_case_insensitive() {
        let mut def = rule("pytest-patterns", 0.5, &[], &[]);
        def.trigger.project_types = vec!["Python".to_string()];
        let engine = engine(vec![def]);

        let ctx = SessionContext::new("python").normalize();
        assert_eq!(engine.evaluate(&ctx).len(), 1);
        assert!(engine.evaluate(&SessionContext::new("rust").normalize()).is_empty());
    }

    #[test]
    fn test_multiple_rules_same_skill_all_fire() {
        let engine = engine(vec![
            rule("owasp-top-10", 0.9, &["**/auth/**"], &[]),
            rule("owasp-top-10", 0.6, &["**/*.py"], &[]),
        ]);
        let ctx = SessionContext::new("").with_file("src/auth/login.py").normalize();
        assert_eq!(engine.evaluate(&ctx).len(), 2);
    }

    #[test]
    fn test_reason_template_rendering() {
        let mut def = rule("owasp-top-10", 0.9, &["**/auth/**"], &[]);
        def.reason = "{skill}: auth files {files} ({project_type})".to_string();
        let engine = engine(vec![def]);
        let ctx = SessionContext::new("python")
            .with_file("src/auth/a.py")
            .with_file("src/auth/b.py")
            .with_file("src/auth/c.py")
            .with_file("src/auth/d.py")
            .normalize();

        let recs = engine.evaluate(&ctx);
        assert_eq!(
            recs[0].reason,
            "owasp-top-10: auth files src/auth/a.py, src/auth/b.py, src/auth/c.py, and 1 more (python)"
        );
    }

    #[test]
    fn test_non_placeholder_braces_stay_literal() {
        let mut def = rule("owasp-top-10", 0.9, &["**/auth/**"], &[]);
        def.reason = "{skill} covers {1} and {}".to_string();
        let rule = Rule::compile(0, &def).unwrap();
        let ctx = SessionContext::new("").with_file("src/auth/a.py").normalize();

        let rec = rule.evaluate(&ctx).unwrap();
        assert_eq!(rec.reason, "owasp-top-10 covers {1} and {}");
    }

    #[test]
    fn test_default_reason_lists_triggers() {
        let engine = engine(vec![rule("owasp-top-10", 0.9, &["**/auth/**"], &[])]);
        let ctx = SessionContext::new("").with_file("src/auth/x.rs").normalize();
        assert_eq!(engine.evaluate(&ctx)[0].reason, "Rule matched: **/auth/**");
    }

    #[test]
    fn test_estimated_value_override() {
        let mut def = rule("owasp-top-10", 0.9, &["**/auth/**"], &[]);
        def.estimated_value = Some(EstimatedValue::Low);
        let engine = engine(vec![def]);
        let ctx = SessionContext::new("").with_file("src/auth/x.rs").normalize();
        assert_eq!(engine.evaluate(&ctx)[0].estimated_value, EstimatedValue::Low);
    }

    #[test]
    fn test_rejects_empty_skill() {
        let err = RuleEngine::from_file(&RuleFile {
            rules: vec![rule(" ", 0.5, &["*.rs"], &[])],
        })
        .unwrap_err();
        assert!(err.to_string().contains("skill name is empty"));
    }

    #[test]
    fn test_rejects_confidence_out_of_range() {
        let err = RuleEngine::from_file(&RuleFile {
            rules: vec![rule("a", 1.2, &["*.rs"], &[])],
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { index: 0, .. }));
    }

    #[test]
    fn test_rejects_empty_trigger() {
        let err = RuleEngine::from_file(&RuleFile {
            rules: vec![rule("a", 0.5, &[], &[])],
        })
        .unwrap_err();
        assert!(err.to_string().contains("no conditions"));
    }

    #[test]
    fn test_rejects_invalid_glob() {
        let err = RuleEngine::from_file(&RuleFile {
            rules: vec![rule("a", 0.5, &["src/a**"], &[])],
        })
        .unwrap_err();
        assert!(err.to_string().contains("invalid glob"));
    }

    #[test]
    fn test_rejects_unknown_placeholder() {
        let mut def = rule("a", 0.5, &["*.rs"], &[]);
        def.reason = "touched {filez}".to_string();
        let err = RuleEngine::from_file(&RuleFile { rules: vec![def] }).unwrap_err();
        assert!(err.to_string().contains("unknown placeholder"));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(
            &path,
            r#"
[[rules]]
skill = "owasp-top-10"
confidence = 0.9
[rules.trigger]
files = ["**/auth/**"]
"#,
        )
        .unwrap();

        let engine = RuleEngine::load(&path).unwrap();
        assert_eq!(engine.len(), 1);
        assert!(!engine.is_empty());
    }
}
