//! Skill recommendation strategies and their aggregation.
//!
//! Three independent signal sources propose candidates:
//! - declarative rules over touched files, active agents and project type
//! - a static agent to skill table
//! - patterns learned from past feedback
//!
//! The [`Aggregator`] merges them into one ranked list.

mod agents;
mod aggregator;
mod patterns;
mod rules;
mod types;

pub use agents::AgentSkillMapper;
pub use aggregator::Aggregator;
pub use patterns::PatternLearner;
pub use rules::{Rule, RuleEngine};
pub use types::{EstimatedValue, SkillRecommendation, StrategyKind};

use crate::context::NormalizedContext;
use crate::error::Result;

/// A candidate source. The set is closed; the aggregator iterates a fixed list.
#[derive(Debug, Clone)]
pub enum Strategy {
    Rules(RuleEngine),
    Agents(AgentSkillMapper),
    Patterns(PatternLearner),
}

impl Strategy {
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Rules(_) => StrategyKind::RuleBased,
            Self::Agents(_) => StrategyKind::AgentBased,
            Self::Patterns(_) => StrategyKind::PatternBased,
        }
    }

    /// Propose candidates for a context.
    ///
    /// # Errors
    ///
    /// Only the pattern strategy can fail, when the store cannot be queried.
    pub fn score(&self, ctx: &NormalizedContext) -> Result<Vec<SkillRecommendation>> {
        match self {
            Self::Rules(engine) => Ok(engine.evaluate(ctx)),
            Self::Agents(mapper) => Ok(mapper.recommend(ctx)),
            Self::Patterns(learner) => learner.recommend(ctx),
        }
    }
}
