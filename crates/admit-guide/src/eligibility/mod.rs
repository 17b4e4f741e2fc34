//! Admission eligibility scoring and program recommendation.
//!
//! Everything in this module is pure: no I/O, no clocks, no logging. The
//! engine is built once from validated configuration and shared freely
//! between concurrent requests.

mod classifier;
pub mod config;
pub mod domain;
mod estimator;
mod normalizer;
mod quota;
mod ranker;
pub mod rationale;
pub mod states;

#[cfg(test)]
mod tests;

pub use classifier::ProgramClassifier;
pub use config::{
    ClassificationConfig, ConfigurationError, EngineConfig, EstimatorConfig, NormalizationConfig,
    RankingConfig,
};
pub use domain::{
    AdmissionMode, CandidateProfile, Category, CutoffRecord, DataConfidence, Grade, Program,
    ProgramEligibility, ProgramId, QuotaType, UTME_MAX,
};
pub use estimator::{
    EligibilityEstimate, EligibilityEstimator, EstimateFeatures, EstimateModel, ProbabilityPoint,
    Trend,
};
pub use normalizer::{CompositeScore, NormalizationError, ScoreNormalizer};
pub use ranker::{RecommendationFilter, RecommendationRanker, RecommendedProgram, Recommendations};

use serde::{Deserialize, Serialize};

/// Error raised by engine entry points that consume a candidate profile.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Normalization(err) => err.kind(),
        }
    }
}

/// Full single-program evaluation, including the inputs behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramEvaluation {
    pub composite: CompositeScore,
    pub estimate: EligibilityEstimate,
    pub eligibility: ProgramEligibility,
    pub rationale: String,
    pub probability_curve: Vec<ProbabilityPoint>,
}

/// Normalizer, estimator, classifier and ranker sharing one validated config.
pub struct EligibilityEngine {
    normalizer: ScoreNormalizer,
    estimator: EligibilityEstimator,
    classifier: ProgramClassifier,
    ranker: RecommendationRanker,
}

impl EligibilityEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let EngineConfig {
            normalization,
            estimator,
            classification,
            ranking,
        } = config;

        Ok(Self {
            normalizer: ScoreNormalizer::new(normalization),
            estimator: EligibilityEstimator::new(estimator),
            classifier: ProgramClassifier::new(classification),
            ranker: RecommendationRanker::new(ranking),
        })
    }

    pub fn ranking_config(&self) -> &RankingConfig {
        self.ranker.config()
    }

    pub fn normalize(&self, profile: &CandidateProfile) -> Result<CompositeScore, NormalizationError> {
        self.normalizer.normalize(profile)
    }

    pub fn estimate(&self, composite: f64, history: &[CutoffRecord]) -> EligibilityEstimate {
        self.estimator.estimate(composite, history)
    }

    pub fn classify(&self, probability: f64) -> Category {
        self.classifier.classify(probability)
    }

    /// Rank every program for the candidate and keep the best `limit`.
    ///
    /// `limit` falls back to the configured default and is capped at the
    /// configured maximum.
    pub fn rank(
        &self,
        profile: &CandidateProfile,
        programs: &[Program],
        limit: Option<usize>,
    ) -> Result<Recommendations, EngineError> {
        self.rank_filtered(profile, programs, &RecommendationFilter::default(), limit)
    }

    /// Like [`rank`](Self::rank), dropping programs the filter rejects before truncation.
    pub fn rank_filtered(
        &self,
        profile: &CandidateProfile,
        programs: &[Program],
        filter: &RecommendationFilter,
        limit: Option<usize>,
    ) -> Result<Recommendations, EngineError> {
        let composite = self.normalizer.normalize(profile)?;
        let items = self.ranker.rank(
            &composite,
            programs,
            &self.estimator,
            &self.classifier,
            filter,
            limit,
        );

        Ok(Recommendations {
            composite,
            total_programs: programs.len(),
            items,
        })
    }

    /// Evaluate one program in depth for the eligibility calculator.
    pub fn evaluate(
        &self,
        profile: &CandidateProfile,
        program: &Program,
    ) -> Result<ProgramEvaluation, EngineError> {
        let composite = self.normalizer.normalize(profile)?;
        let history = quota::applicable_history(program, composite.state_of_origin.as_deref());
        let estimate = self.estimator.estimate(composite.value, &history);
        let category = self.classifier.classify(estimate.probability);
        let rationale = rationale::explain(&composite, profile.utme_score, program, &estimate, category);
        let probability_curve = self.estimator.probability_curve(composite.value, &history);

        let eligibility = ProgramEligibility {
            probability: estimate.probability,
            category,
            composite_score: composite.value,
            confidence_interval: estimate.confidence_interval,
            low_confidence: estimate.low_confidence,
        };

        Ok(ProgramEvaluation {
            composite,
            estimate,
            eligibility,
            rationale,
            probability_curve,
        })
    }
}
