use serde::{Deserialize, Serialize};

use super::domain::Grade;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Tunable weights and thresholds for the whole engine.
///
/// Every section falls back to its defaults when omitted from a JSON
/// config file, so operators only spell out what they change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub normalization: NormalizationConfig,
    pub estimator: EstimatorConfig,
    pub classification: ClassificationConfig,
    pub ranking: RankingConfig,
}

/// Blend of UTME, O-level and post-UTME inputs into the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizationConfig {
    pub utme_weight: f64,
    pub olevel_weight: f64,
    pub post_utme_weight: f64,
    /// Upper bound of the institution post-UTME scale.
    pub post_utme_max: f64,
    /// Worst grade that still counts as a credit pass.
    pub passing_grade: Grade,
    pub minimum_passing_subjects: usize,
    /// Number of best passing subjects averaged into the O-level aggregate.
    pub counted_subjects: usize,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            utme_weight: 0.6,
            olevel_weight: 0.3,
            post_utme_weight: 0.1,
            post_utme_max: 100.0,
            passing_grade: Grade::C6,
            minimum_passing_subjects: 5,
            counted_subjects: 5,
        }
    }
}

/// Recency-weighted cutoff model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorConfig {
    /// Exponential decay applied per year of age, relative to the newest record.
    pub recency_decay: f64,
    /// Composite points per logit of the logistic curve.
    pub logistic_scale: f64,
    /// Share of the fitted yearly trend carried into the projected cutoff.
    pub trend_damping: f64,
    pub max_trend_per_year: f64,
    pub fallback_probability: f64,
    pub fallback_margin: f64,
    /// Score-space spread for a single year of history; shrinks with sqrt(n).
    pub base_uncertainty: f64,
    pub variance_multiplier: f64,
    pub min_history_years: usize,
    /// Slope (points per year) beyond which a trend is reported.
    pub trend_threshold: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            recency_decay: 0.7,
            logistic_scale: 8.0,
            trend_damping: 0.5,
            max_trend_per_year: 10.0,
            fallback_probability: 0.5,
            fallback_margin: 0.3,
            base_uncertainty: 6.0,
            variance_multiplier: 1.0,
            min_history_years: 2,
            trend_threshold: 2.0,
        }
    }
}

/// Lower bounds of the safe and target probability bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassificationConfig {
    pub safe_min: f64,
    pub target_min: f64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            safe_min: 0.7,
            target_min: 0.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankingConfig {
    pub probability_weight: f64,
    pub recency_weight: f64,
    pub confidence_weight: f64,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            probability_weight: 0.85,
            recency_weight: 0.1,
            confidence_weight: 0.05,
            default_limit: 20,
            max_limit: 50,
        }
    }
}

impl RankingConfig {
    /// Resolve a caller-supplied limit against the configured default and cap.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

/// Every problem found while validating an [`EngineConfig`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid engine configuration: {}", .problems.join("; "))]
pub struct ConfigurationError {
    pub problems: Vec<String>,
}

impl EngineConfig {
    /// Validate the configuration, returning all problems at once.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut problems = Vec::new();
        self.normalization.collect_problems(&mut problems);
        self.estimator.collect_problems(&mut problems);
        self.classification.collect_problems(&mut problems);
        self.ranking.collect_problems(&mut problems);

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError { problems })
        }
    }
}

fn check_unit(problems: &mut Vec<String>, field: &str, value: f64) {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        problems.push(format!("{field}: must be within [0, 1], found {value}"));
    }
}

fn check_positive(problems: &mut Vec<String>, field: &str, value: f64) {
    if !value.is_finite() || value <= 0.0 {
        problems.push(format!("{field}: must be a positive number, found {value}"));
    }
}

fn check_non_negative(problems: &mut Vec<String>, field: &str, value: f64) {
    if !value.is_finite() || value < 0.0 {
        problems.push(format!("{field}: must be non-negative, found {value}"));
    }
}

impl NormalizationConfig {
    fn collect_problems(&self, problems: &mut Vec<String>) {
        check_unit(problems, "normalization.utme_weight", self.utme_weight);
        check_unit(problems, "normalization.olevel_weight", self.olevel_weight);
        check_unit(problems, "normalization.post_utme_weight", self.post_utme_weight);

        let sum = self.utme_weight + self.olevel_weight + self.post_utme_weight;
        if sum.is_finite() && (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            problems.push(format!("normalization weights must sum to 1, found {sum}"));
        }
        if self.utme_weight <= 0.0 {
            problems.push("normalization.utme_weight: must be greater than 0".to_string());
        }

        check_positive(problems, "normalization.post_utme_max", self.post_utme_max);

        if self.minimum_passing_subjects == 0 {
            problems.push("normalization.minimum_passing_subjects: must be at least 1".to_string());
        }
        if self.counted_subjects < self.minimum_passing_subjects {
            problems.push(format!(
                "normalization.counted_subjects: must be >= minimum_passing_subjects ({}), found {}",
                self.minimum_passing_subjects, self.counted_subjects
            ));
        }
        if self.passing_grade.points() == 0 {
            problems.push(format!(
                "normalization.passing_grade: {} earns no points",
                self.passing_grade.label()
            ));
        }
    }
}

impl EstimatorConfig {
    fn collect_problems(&self, problems: &mut Vec<String>) {
        if !self.recency_decay.is_finite() || self.recency_decay <= 0.0 || self.recency_decay > 1.0
        {
            problems.push(format!(
                "estimator.recency_decay: must be within (0, 1], found {}",
                self.recency_decay
            ));
        }
        check_positive(problems, "estimator.logistic_scale", self.logistic_scale);
        check_unit(problems, "estimator.trend_damping", self.trend_damping);
        check_non_negative(problems, "estimator.max_trend_per_year", self.max_trend_per_year);
        check_unit(problems, "estimator.fallback_probability", self.fallback_probability);
        check_non_negative(problems, "estimator.fallback_margin", self.fallback_margin);
        check_non_negative(problems, "estimator.base_uncertainty", self.base_uncertainty);
        check_non_negative(problems, "estimator.variance_multiplier", self.variance_multiplier);
        check_non_negative(problems, "estimator.trend_threshold", self.trend_threshold);
    }
}

impl ClassificationConfig {
    fn collect_problems(&self, problems: &mut Vec<String>) {
        check_unit(problems, "classification.safe_min", self.safe_min);
        check_unit(problems, "classification.target_min", self.target_min);
        if self.target_min >= self.safe_min {
            problems.push(format!(
                "classification bands overlap: target_min ({}) must be below safe_min ({})",
                self.target_min, self.safe_min
            ));
        }
    }
}

impl RankingConfig {
    fn collect_problems(&self, problems: &mut Vec<String>) {
        check_positive(problems, "ranking.probability_weight", self.probability_weight);
        check_non_negative(problems, "ranking.recency_weight", self.recency_weight);
        check_non_negative(problems, "ranking.confidence_weight", self.confidence_weight);
        if self.max_limit == 0 {
            problems.push("ranking.max_limit: must be at least 1".to_string());
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            problems.push(format!(
                "ranking.default_limit: must be within [1, max_limit ({})], found {}",
                self.max_limit, self.default_limit
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default()
            .validate()
            .expect("defaults validate");
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut config = EngineConfig::default();
        config.normalization.olevel_weight = 0.5;

        let err = config.validate().expect_err("weights rejected");
        assert!(err
            .problems
            .iter()
            .any(|problem| problem.contains("sum to 1")));
    }

    #[test]
    fn overlapping_bands_are_rejected() {
        let mut config = EngineConfig::default();
        config.classification.target_min = 0.8;

        let err = config.validate().expect_err("bands rejected");
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn collects_every_problem() {
        let mut config = EngineConfig::default();
        config.estimator.logistic_scale = 0.0;
        config.ranking.default_limit = 80;
        config.normalization.counted_subjects = 3;

        let err = config.validate().expect_err("config rejected");
        assert_eq!(err.problems.len(), 3);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"classification":{"safe_min":0.8}}"#).expect("parses");
        assert_eq!(config.classification.safe_min, 0.8);
        assert_eq!(config.classification.target_min, 0.35);
        assert_eq!(config.ranking, RankingConfig::default());
    }

    #[test]
    fn effective_limit_is_capped() {
        let ranking = RankingConfig::default();
        assert_eq!(ranking.effective_limit(None), 20);
        assert_eq!(ranking.effective_limit(Some(5)), 5);
        assert_eq!(ranking.effective_limit(Some(500)), 50);
    }
}
