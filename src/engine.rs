//! The advisor service object.
//!
//! [`SkillAdvisor`] is built once from an [`AdvisorConfig`] and owns every
//! component. It holds a store location, never an open connection.

use uuid::Uuid;

use crate::config::AdvisorConfig;
use crate::context::SessionContext;
use crate::error::Result;
use crate::feedback::{ContextPattern, FeedbackOutcome, FeedbackRecorder, FeedbackStats, RecommendationRecord};
use crate::ratings::{
    ExportReport, NewRating, RatingCollector, SkillQualityMetrics, SkillRating, TrustSignal,
};
use crate::recommend::{AgentSkillMapper, Aggregator, PatternLearner, RuleEngine, SkillRecommendation, Strategy};
use crate::store::Store;

/// Recommends skills for a session and learns from what happened next.
#[derive(Debug, Clone)]
pub struct SkillAdvisor {
    config: AdvisorConfig,
    store: Store,
    strategies: Vec<Strategy>,
    aggregator: Aggregator,
    recorder: FeedbackRecorder,
    ratings: RatingCollector,
}

impl SkillAdvisor {
    /// Build an advisor, loading the rule file and agent mapping named in
    /// `config`. Unset paths mean an empty rule set or mapping.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Configuration`](crate::error::SkillError::Configuration)
    /// for invalid settings or malformed rule/mapping files, or
    /// [`SkillError::Persistence`](crate::error::SkillError::Persistence) if the
    /// store cannot be opened.
    pub fn open(config: AdvisorConfig) -> Result<Self> {
        config.validate()?;
        let rules = match &config.rules_path {
            Some(path) => RuleEngine::load(path)?,
            None => RuleEngine::empty(),
        };
        let agents = match &config.agents_path {
            Some(path) => AgentSkillMapper::load(path)?,
            None => AgentSkillMapper::empty(),
        };
        Self::with_components(config, rules, agents)
    }

    /// Build an advisor from already-loaded rules and mappings.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid settings or if the store cannot be opened.
    pub fn with_components(
        config: AdvisorConfig,
        rules: RuleEngine,
        agents: AgentSkillMapper,
    ) -> Result<Self> {
        config.validate()?;
        let store = Store::open(&config.store.path, config.store.settings())?;

        tracing::info!(
            db = %store.path().display(),
            rules = rules.len(),
            "Skill advisor ready"
        );

        let strategies = vec![
            Strategy::Rules(rules),
            Strategy::Agents(agents),
            Strategy::Patterns(PatternLearner::new(store.clone(), &config.patterns)),
        ];

        Ok(Self {
            aggregator: Aggregator::from_config(&config.recommend),
            recorder: FeedbackRecorder::new(store.clone()),
            ratings: RatingCollector::new(store.clone()),
            strategies,
            store,
            config,
        })
    }

    /// Replace the rating collector's user identity.
    #[must_use]
    pub fn with_user_hash(mut self, user_hash: impl Into<String>) -> Self {
        self.ratings = RatingCollector::with_user_hash(self.store.clone(), user_hash);
        self
    }

    #[must_use]
    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Ranked recommendations for a context. Nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::Persistence`](crate::error::SkillError::Persistence)
    /// if learned patterns or ratings cannot be read.
    pub fn recommend(&self, ctx: &SessionContext) -> Result<Vec<SkillRecommendation>> {
        let normalized = ctx.normalize();

        let mut candidates = Vec::new();
        for strategy in &self.strategies {
            let proposed = strategy.score(&normalized)?;
            tracing::debug!(
                strategy = strategy.kind().as_str(),
                candidates = proposed.len(),
                "Strategy scored"
            );
            candidates.extend(proposed);
        }

        let ratings = self
            .ratings
            .average_ratings(candidates.iter().map(|c| c.skill_name.as_str()))?;
        let ranked = self.aggregator.aggregate(candidates, &ratings);

        tracing::debug!(
            context_hash = %normalized.hash,
            recommendations = ranked.len(),
            "Recommendations computed"
        );
        Ok(ranked)
    }

    /// Persist recommendations the caller surfaced. Auto-activated ones are
    /// stored as activated.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be stored; nothing is stored then.
    pub fn surface(
        &self,
        ctx: &SessionContext,
        recs: &[SkillRecommendation],
    ) -> Result<Vec<RecommendationRecord>> {
        self.recorder.record_all(&ctx.normalize(), recs)
    }

    /// Persist a single surfaced recommendation.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record(
        &self,
        ctx: &SessionContext,
        rec: &SkillRecommendation,
        activated: bool,
    ) -> Result<RecommendationRecord> {
        self.recorder.record(&ctx.normalize(), rec, activated)
    }

    /// Mark that `skill` was acted on in this context.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty skill name, or a persistence error.
    pub fn record_activation(&self, ctx: &SessionContext, skill: &str) -> Result<RecommendationRecord> {
        self.recorder.record_activation(&ctx.normalize(), skill)
    }

    /// Attach the outcome of a recorded recommendation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `AlreadyRecorded` or a persistence error.
    pub fn submit_feedback(
        &self,
        recommendation_id: Uuid,
        helpful: bool,
        succeeded: bool,
        comment: Option<&str>,
    ) -> Result<FeedbackOutcome> {
        self.recorder
            .submit_feedback(recommendation_id, helpful, succeeded, comment)
    }

    /// Record an explicit star rating.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or a persistence error.
    pub fn rate(&self, rating: &NewRating) -> Result<SkillRating> {
        self.ratings.rate(rating)
    }

    /// Quality metrics of a skill.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub fn get_score(&self, skill: &str) -> Result<SkillQualityMetrics> {
        self.ratings.get_score(skill)
    }

    /// Best rated skills, optionally limited to one project type.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub fn top_rated(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, SkillQualityMetrics)>> {
        self.ratings.top_rated(category, limit)
    }

    /// Quality signal for routing decisions.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub fn trust_signal(&self, skill: &str) -> Result<TrustSignal> {
        self.ratings.trust_signal(skill)
    }

    /// Every rating of one skill, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub fn ratings(&self, skill: &str) -> Result<Vec<SkillRating>> {
        self.ratings.ratings(skill)
    }

    /// Dump ratings and metrics for one or every skill.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub fn export(&self, skill: Option<&str>) -> Result<ExportReport> {
        self.ratings.export(skill)
    }

    /// Most recent recommendation records, newest first.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub fn history(&self, limit: usize) -> Result<Vec<RecommendationRecord>> {
        self.recorder.history(limit)
    }

    /// Look up a single recommendation record.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub fn get_record(&self, id: Uuid) -> Result<Option<RecommendationRecord>> {
        self.recorder.get_record(id)
    }

    /// Totals over the recommendation history.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub fn feedback_stats(&self) -> Result<FeedbackStats> {
        self.recorder.stats()
    }

    /// The learned pattern for a context, if any.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub fn get_pattern(&self, ctx: &SessionContext) -> Result<Option<ContextPattern>> {
        self.recorder.get_pattern(&ctx.normalize().hash)
    }

    /// Apply the configured retention policy to learned patterns.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the delete fails.
    pub fn prune_patterns(&self) -> Result<usize> {
        self.recorder.prune_patterns(
            self.config.patterns.retention_days,
            self.config.patterns.max_patterns,
        )
    }
}
