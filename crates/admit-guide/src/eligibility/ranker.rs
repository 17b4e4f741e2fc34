use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::classifier::ProgramClassifier;
use super::config::RankingConfig;
use super::domain::{Category, Program, ProgramEligibility, ProgramId};
use super::estimator::{EligibilityEstimate, EligibilityEstimator};
use super::normalizer::CompositeScore;
use super::quota::applicable_history;
use super::states::canonical_state;

/// Optional narrowing applied before the ranked list is truncated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationFilter {
    pub min_probability: Option<f64>,
    pub categories: Vec<Category>,
    pub institution_state: Option<String>,
    pub institution_type: Option<String>,
}

impl RecommendationFilter {
    pub fn is_empty(&self) -> bool {
        self.min_probability.is_none()
            && self.categories.is_empty()
            && self.institution_state.is_none()
            && self.institution_type.is_none()
    }

    fn admits_program(&self, program: &Program) -> bool {
        if let Some(wanted) = self.institution_state.as_deref() {
            let matches = match (program.institution_state.as_deref(), canonical_state(wanted)) {
                (Some(actual), Some(wanted)) => canonical_state(actual) == Some(wanted),
                (Some(actual), None) => actual.trim().eq_ignore_ascii_case(wanted.trim()),
                (None, _) => false,
            };
            if !matches {
                return false;
            }
        }

        if let Some(wanted) = self.institution_type.as_deref() {
            let matches = program
                .institution_type
                .as_deref()
                .map(|actual| actual.trim().eq_ignore_ascii_case(wanted.trim()))
                .unwrap_or(false);
            if !matches {
                return false;
            }
        }

        true
    }

    fn admits_eligibility(&self, eligibility: &ProgramEligibility) -> bool {
        if let Some(min) = self.min_probability {
            if eligibility.probability < min {
                return false;
            }
        }
        self.categories.is_empty() || self.categories.contains(&eligibility.category)
    }
}

/// One entry of a ranked recommendation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedProgram {
    pub program_id: ProgramId,
    pub program_name: String,
    pub institution_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_type: Option<String>,
    pub eligibility: ProgramEligibility,
    pub blended_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_cutoff_year: Option<u16>,
}

/// Ranked output for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub composite: CompositeScore,
    /// Number of programs considered, before filtering and truncation.
    pub total_programs: usize,
    pub items: Vec<RecommendedProgram>,
}

pub struct RecommendationRanker {
    config: RankingConfig,
}

struct Evaluated<'a> {
    program: &'a Program,
    estimate: EligibilityEstimate,
    category: Category,
}

impl RecommendationRanker {
    pub(crate) fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Evaluate every program, order the results, then truncate.
    ///
    /// Ordering is blended score descending, then probability descending,
    /// then program id ascending, which makes the output total and stable.
    pub(crate) fn rank(
        &self,
        composite: &CompositeScore,
        programs: &[Program],
        estimator: &EligibilityEstimator,
        classifier: &ProgramClassifier,
        filter: &RecommendationFilter,
        limit: Option<usize>,
    ) -> Vec<RecommendedProgram> {
        let state = composite.state_of_origin.as_deref();
        let evaluated: Vec<Evaluated<'_>> = programs
            .iter()
            .filter(|program| filter.admits_program(program))
            .map(|program| {
                let history = applicable_history(program, state);
                let estimate = estimator.estimate(composite.value, &history);
                let category = classifier.classify(estimate.probability);
                Evaluated {
                    program,
                    estimate,
                    category,
                }
            })
            .collect();

        let reference_year = evaluated
            .iter()
            .filter_map(|entry| entry.estimate.features.latest_year)
            .max();

        let mut ranked: Vec<RecommendedProgram> = evaluated
            .into_iter()
            .map(|entry| self.recommendation(composite, entry, reference_year))
            .filter(|item| filter.admits_eligibility(&item.eligibility))
            .collect();

        ranked.sort_by(compare_recommendations);
        ranked.truncate(self.config.effective_limit(limit));
        ranked
    }

    fn recommendation(
        &self,
        composite: &CompositeScore,
        entry: Evaluated<'_>,
        reference_year: Option<u16>,
    ) -> RecommendedProgram {
        let Evaluated {
            program,
            estimate,
            category,
        } = entry;

        let latest_year = estimate.features.latest_year;
        let recency = match (latest_year, reference_year) {
            (Some(latest), Some(reference)) => {
                1.0 / (1.0 + f64::from(reference.saturating_sub(latest)))
            }
            _ => 0.0,
        };
        let (low, high) = estimate.confidence_interval;
        let blended_score = self.config.probability_weight * estimate.probability
            + self.config.recency_weight * recency
            + self.config.confidence_weight * (1.0 - (high - low));

        RecommendedProgram {
            program_id: program.id.clone(),
            program_name: program.name.clone(),
            institution_name: program.institution_name.clone(),
            institution_state: program.institution_state.clone(),
            institution_type: program.institution_type.clone(),
            eligibility: ProgramEligibility {
                probability: estimate.probability,
                category,
                composite_score: composite.value,
                confidence_interval: estimate.confidence_interval,
                low_confidence: estimate.low_confidence,
            },
            blended_score,
            latest_cutoff_year: latest_year,
        }
    }
}

fn compare_recommendations(a: &RecommendedProgram, b: &RecommendedProgram) -> Ordering {
    b.blended_score
        .total_cmp(&a.blended_score)
        .then_with(|| b.eligibility.probability.total_cmp(&a.eligibility.probability))
        .then_with(|| a.program_id.cmp(&b.program_id))
}
