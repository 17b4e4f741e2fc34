use serde::{Deserialize, Serialize};

use super::config::NormalizationConfig;
use super::domain::{CandidateProfile, Grade, UTME_MAX};
use super::states::canonical_state;

/// Reasons a candidate profile cannot be turned into a composite score.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizationError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("at least {required} passing O-level subjects are required, found {found}")]
    InsufficientSubjects { required: usize, found: usize },
}

impl NormalizationError {
    pub fn kind(&self) -> &'static str {
        match self {
            NormalizationError::InvalidInput { .. } => "invalid_input",
            NormalizationError::InsufficientSubjects { .. } => "insufficient_subjects",
        }
    }
}

/// Composite score on the 0-100 scale together with the inputs that built it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub value: f64,
    /// UTME score rescaled to 0-100.
    pub utme_component: f64,
    /// Mean of the best counted passing grades, rescaled to 0-100.
    pub olevel_aggregate: f64,
    pub passing_subjects: usize,
    pub counted_subjects: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_utme_component: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_of_origin: Option<String>,
}

pub struct ScoreNormalizer {
    config: NormalizationConfig,
}

impl ScoreNormalizer {
    pub(crate) fn new(config: NormalizationConfig) -> Self {
        Self { config }
    }

    pub fn normalize(&self, profile: &CandidateProfile) -> Result<CompositeScore, NormalizationError> {
        if profile.utme_score > UTME_MAX {
            return Err(NormalizationError::InvalidInput {
                field: "utme_score",
                reason: format!("must be between 0 and {UTME_MAX}, found {}", profile.utme_score),
            });
        }

        let post_utme_component = match profile.post_utme_score {
            Some(score) if !score.is_finite() || score < 0.0 || score > self.config.post_utme_max => {
                return Err(NormalizationError::InvalidInput {
                    field: "post_utme_score",
                    reason: format!(
                        "must be between 0 and {}, found {score}",
                        self.config.post_utme_max
                    ),
                });
            }
            Some(score) => Some(score / self.config.post_utme_max * 100.0),
            None => None,
        };

        let state_of_origin = match profile.state_of_origin.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(raw) => match canonical_state(raw) {
                Some(state) => Some(state.to_string()),
                None => {
                    return Err(NormalizationError::InvalidInput {
                        field: "state_of_origin",
                        reason: format!("'{raw}' is not a Nigerian state"),
                    })
                }
            },
        };

        let mut passing_points: Vec<u8> = profile
            .o_level_grades
            .values()
            .filter_map(|raw| raw.parse::<Grade>().ok())
            .filter(|grade| grade.meets(self.config.passing_grade))
            .map(Grade::points)
            .collect();

        let passing_subjects = passing_points.len();
        if passing_subjects < self.config.minimum_passing_subjects {
            return Err(NormalizationError::InsufficientSubjects {
                required: self.config.minimum_passing_subjects,
                found: passing_subjects,
            });
        }

        passing_points.sort_unstable_by(|a, b| b.cmp(a));
        let counted_subjects = passing_subjects.min(self.config.counted_subjects);
        let counted_total: u32 = passing_points
            .iter()
            .take(counted_subjects)
            .map(|points| u32::from(*points))
            .sum();
        let olevel_aggregate =
            counted_total as f64 / (counted_subjects as f64 * f64::from(Grade::MAX_POINTS)) * 100.0;

        let utme_component = f64::from(profile.utme_score) / f64::from(UTME_MAX) * 100.0;

        let value = match post_utme_component {
            Some(post) => {
                self.config.utme_weight * utme_component
                    + self.config.olevel_weight * olevel_aggregate
                    + self.config.post_utme_weight * post
            }
            None => {
                let base = self.config.utme_weight + self.config.olevel_weight;
                (self.config.utme_weight * utme_component
                    + self.config.olevel_weight * olevel_aggregate)
                    / base
            }
        };

        Ok(CompositeScore {
            value: value.clamp(0.0, 100.0),
            utme_component,
            olevel_aggregate,
            passing_subjects,
            counted_subjects,
            post_utme_component,
            state_of_origin,
        })
    }
}
