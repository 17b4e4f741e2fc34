use serde::{Deserialize, Serialize};

use super::config::EstimatorConfig;
use super::domain::CutoffRecord;

/// Direction of the fitted yearly cutoff trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateModel {
    /// Logistic curve around the recency-weighted expected cutoff.
    Logistic,
    /// No usable history; midpoint probability.
    Fallback,
}

/// Inputs the estimate was derived from, surfaced for explanations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateFeatures {
    pub years_of_data: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_cutoff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_cutoff: Option<f64>,
    pub trend: Trend,
    pub trend_per_year: f64,
}

/// Admission probability for one composite score against one cutoff history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityEstimate {
    pub probability: f64,
    pub confidence_interval: (f64, f64),
    pub low_confidence: bool,
    pub model: EstimateModel,
    pub features: EstimateFeatures,
}

/// One point on a candidate's probability curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityPoint {
    pub score: f64,
    pub probability: f64,
}

/// Composite points either side of the candidate covered by the curve.
const CURVE_RADIUS: f64 = 30.0;
const CURVE_STEP: f64 = 2.0;

pub struct EligibilityEstimator {
    config: EstimatorConfig,
}

struct WeightedFit {
    latest_year: u16,
    latest_cutoff: f64,
    mean_cutoff: f64,
    mean_year: f64,
    slope: f64,
    std_dev: f64,
}

impl EligibilityEstimator {
    pub(crate) fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Estimate the probability that `composite` clears the next cutoff.
    ///
    /// History order does not matter; unusable records are skipped and an
    /// empty history yields the low-confidence fallback instead of an error.
    pub fn estimate(&self, composite: f64, history: &[CutoffRecord]) -> EligibilityEstimate {
        let mut records: Vec<&CutoffRecord> =
            history.iter().filter(|record| record.is_usable()).collect();
        // Fixed summation order keeps the result bit-identical for any input order.
        records.sort_by(|a, b| {
            b.year
                .cmp(&a.year)
                .then_with(|| a.cutoff_score.total_cmp(&b.cutoff_score))
        });

        let Some(fit) = self.fit(&records) else {
            return self.fallback();
        };

        let target_year = f64::from(fit.latest_year) + 1.0;
        let expected_cutoff =
            fit.mean_cutoff + self.config.trend_damping * fit.slope * (target_year - fit.mean_year);

        let gap = composite - expected_cutoff;
        let spread = self.config.base_uncertainty / (records.len() as f64).sqrt()
            + self.config.variance_multiplier * fit.std_dev;

        let probability = self.logistic(gap);
        let low = self.logistic(gap - spread).min(probability);
        let high = self.logistic(gap + spread).max(probability);

        EligibilityEstimate {
            probability,
            confidence_interval: (low, high),
            low_confidence: records.len() < self.config.min_history_years,
            model: EstimateModel::Logistic,
            features: EstimateFeatures {
                years_of_data: records.len(),
                latest_year: Some(fit.latest_year),
                latest_cutoff: Some(fit.latest_cutoff),
                expected_cutoff: Some(expected_cutoff),
                trend: self.trend_for(fit.slope),
                trend_per_year: fit.slope,
            },
        }
    }

    /// Probability at 2-point steps within 30 points of `composite`,
    /// clipped to the 0-100 scale.
    pub fn probability_curve(&self, composite: f64, history: &[CutoffRecord]) -> Vec<ProbabilityPoint> {
        if !composite.is_finite() {
            return Vec::new();
        }
        let low = (composite - CURVE_RADIUS).max(0.0);
        let high = (composite + CURVE_RADIUS).min(100.0);
        if low > high {
            return Vec::new();
        }

        let steps = ((high - low) / CURVE_STEP).floor() as usize;
        (0..=steps)
            .map(|step| {
                let score = low + CURVE_STEP * step as f64;
                ProbabilityPoint {
                    score,
                    probability: self.estimate(score, history).probability,
                }
            })
            .collect()
    }

    fn fallback(&self) -> EligibilityEstimate {
        let probability = self.config.fallback_probability;
        let margin = self.config.fallback_margin;
        EligibilityEstimate {
            probability,
            confidence_interval: (
                (probability - margin).clamp(0.0, probability),
                (probability + margin).clamp(probability, 1.0),
            ),
            low_confidence: true,
            model: EstimateModel::Fallback,
            features: EstimateFeatures {
                years_of_data: 0,
                latest_year: None,
                latest_cutoff: None,
                expected_cutoff: None,
                trend: Trend::Stable,
                trend_per_year: 0.0,
            },
        }
    }

    fn fit(&self, records: &[&CutoffRecord]) -> Option<WeightedFit> {
        let latest = records.iter().max_by_key(|record| record.year)?;
        let latest_year = latest.year;
        // Several records may share the newest year; the largest cutoff wins for reporting.
        let latest_cutoff = records
            .iter()
            .filter(|record| record.year == latest_year)
            .map(|record| record.cutoff_score)
            .fold(f64::NEG_INFINITY, f64::max);

        let weights: Vec<f64> = records
            .iter()
            .map(|record| {
                let age = i32::from(latest_year - record.year);
                self.config.recency_decay.powi(age)
            })
            .collect();
        let total_weight: f64 = weights.iter().sum();
        if total_weight <= 0.0 || !total_weight.is_finite() {
            return None;
        }

        let mean_cutoff = records
            .iter()
            .zip(&weights)
            .map(|(record, weight)| weight * record.cutoff_score)
            .sum::<f64>()
            / total_weight;
        let mean_year = records
            .iter()
            .zip(&weights)
            .map(|(record, weight)| weight * f64::from(record.year))
            .sum::<f64>()
            / total_weight;

        let mut covariance = 0.0;
        let mut year_variance = 0.0;
        let mut cutoff_variance = 0.0;
        for (record, weight) in records.iter().zip(&weights) {
            let dx = f64::from(record.year) - mean_year;
            let dy = record.cutoff_score - mean_cutoff;
            covariance += weight * dx * dy;
            year_variance += weight * dx * dx;
            cutoff_variance += weight * dy * dy;
        }

        let slope = if year_variance > f64::EPSILON {
            (covariance / year_variance)
                .clamp(-self.config.max_trend_per_year, self.config.max_trend_per_year)
        } else {
            0.0
        };

        Some(WeightedFit {
            latest_year,
            latest_cutoff,
            mean_cutoff,
            mean_year,
            slope,
            std_dev: (cutoff_variance / total_weight).sqrt(),
        })
    }

    fn logistic(&self, gap: f64) -> f64 {
        let probability = 1.0 / (1.0 + (-gap / self.config.logistic_scale).exp());
        probability.clamp(0.0, 1.0)
    }

    fn trend_for(&self, slope: f64) -> Trend {
        if slope > self.config.trend_threshold {
            Trend::Increasing
        } else if slope < -self.config.trend_threshold {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> EligibilityEstimator {
        EligibilityEstimator::new(EstimatorConfig::default())
    }

    fn history(entries: &[(u16, f64)]) -> Vec<CutoffRecord> {
        entries
            .iter()
            .map(|(year, cutoff)| CutoffRecord::new(*year, *cutoff))
            .collect()
    }

    fn assert_interval_valid(estimate: &EligibilityEstimate) {
        let (low, high) = estimate.confidence_interval;
        assert!(0.0 <= low, "low {low} below zero");
        assert!(low <= estimate.probability, "low {low} above probability");
        assert!(estimate.probability <= high, "high {high} below probability");
        assert!(high <= 1.0, "high {high} above one");
    }

    #[test]
    fn score_above_recent_cutoffs_is_likely() {
        let estimate = estimator().estimate(220.0, &history(&[(2023, 210.0), (2022, 205.0)]));

        assert!(estimate.probability > 0.5);
        assert_eq!(estimate.model, EstimateModel::Logistic);
        assert!(!estimate.low_confidence);
        assert_eq!(estimate.features.latest_cutoff, Some(210.0));
        assert_eq!(estimate.features.trend, Trend::Increasing);
        assert_interval_valid(&estimate);
    }

    #[test]
    fn probability_curve_spans_scale_and_rises() {
        let history = history(&[(2024, 60.0), (2023, 58.0), (2022, 57.0)]);
        let curve = estimator().probability_curve(60.0, &history);

        assert_eq!(curve.len(), 31);
        assert_eq!(curve[0].score, 30.0);
        assert_eq!(curve[30].score, 90.0);
        assert!(curve
            .windows(2)
            .all(|pair| pair[0].probability <= pair[1].probability));
    }

    #[test]
    fn probability_curve_is_clipped_at_the_top() {
        let curve = estimator().probability_curve(95.0, &history(&[(2024, 80.0)]));

        assert_eq!(curve.first().map(|point| point.score), Some(65.0));
        assert!(curve.iter().all(|point| point.score <= 100.0));
        assert_eq!(curve.len(), 18);
    }

    #[test]
    fn empty_history_falls_back_to_midpoint() {
        let estimate = estimator().estimate(64.0, &[]);

        assert_eq!(estimate.probability, 0.5);
        assert!(estimate.low_confidence);
        assert_eq!(estimate.model, EstimateModel::Fallback);
        assert!((estimate.confidence_interval.0 - 0.2).abs() < 1e-9);
        assert!((estimate.confidence_interval.1 - 0.8).abs() < 1e-9);
        assert_interval_valid(&estimate);
    }

    #[test]
    fn unusable_records_are_treated_as_missing() {
        let estimate = estimator().estimate(64.0, &history(&[(2023, 0.0), (0, 58.0)]));
        assert_eq!(estimate.model, EstimateModel::Fallback);
        assert!(estimate.low_confidence);
    }

    #[test]
    fn single_year_is_low_confidence() {
        let estimate = estimator().estimate(64.0, &history(&[(2024, 60.0)]));
        assert!(estimate.low_confidence);
        assert_eq!(estimate.features.trend, Trend::Stable);
        assert_interval_valid(&estimate);
    }

    #[test]
    fn probability_is_continuous_around_cutoff() {
        let records = history(&[(2024, 60.0)]);
        let below = estimator().estimate(59.9, &records).probability;
        let at = estimator().estimate(60.0, &records).probability;
        let above = estimator().estimate(60.1, &records).probability;

        assert!((at - 0.5).abs() < 1e-9);
        assert!(below < at && at < above);
        assert!(above - below < 0.01);
    }

    #[test]
    fn probability_is_monotonic_in_score() {
        let records = history(&[(2024, 61.0), (2023, 58.5), (2022, 63.0), (2020, 55.0)]);
        let estimator = estimator();
        let mut previous = 0.0;
        for step in 0..=200 {
            let score = f64::from(step) * 0.5;
            let estimate = estimator.estimate(score, &records);
            assert!(estimate.probability >= previous);
            assert_interval_valid(&estimate);
            previous = estimate.probability;
        }
    }

    #[test]
    fn recent_years_dominate_expected_cutoff() {
        let estimate = estimator().estimate(60.0, &history(&[(2024, 70.0), (2016, 40.0)]));
        let expected = estimate.features.expected_cutoff.expect("expected cutoff");
        assert!(expected > 55.0, "expected {expected} should lean on 2024");
    }

    #[test]
    fn interval_widens_with_fewer_years() {
        let estimator = estimator();
        let few = estimator.estimate(62.0, &history(&[(2024, 60.0), (2023, 60.0)]));
        let many = estimator.estimate(
            62.0,
            &history(&[
                (2024, 60.0),
                (2023, 60.0),
                (2022, 60.0),
                (2021, 60.0),
                (2020, 60.0),
                (2019, 60.0),
            ]),
        );

        let width = |estimate: &EligibilityEstimate| {
            estimate.confidence_interval.1 - estimate.confidence_interval.0
        };
        assert!(width(&few) > width(&many));
    }

    #[test]
    fn interval_widens_with_variance() {
        let estimator = estimator();
        let steady = estimator.estimate(62.0, &history(&[(2024, 60.0), (2023, 60.0), (2022, 60.0)]));
        let volatile =
            estimator.estimate(62.0, &history(&[(2024, 60.0), (2023, 48.0), (2022, 71.0)]));

        let width = |estimate: &EligibilityEstimate| {
            estimate.confidence_interval.1 - estimate.confidence_interval.0
        };
        assert!(width(&volatile) > width(&steady));
    }

    #[test]
    fn decreasing_trend_is_reported() {
        let estimate = estimator().estimate(
            60.0,
            &history(&[(2024, 50.0), (2023, 56.0), (2022, 62.0)]),
        );
        assert_eq!(estimate.features.trend, Trend::Decreasing);
        assert!(estimate.features.trend_per_year < 0.0);
    }

    #[test]
    fn history_order_does_not_change_result() {
        let forward = history(&[(2021, 58.0), (2022, 60.0), (2023, 63.0)]);
        let mut reversed = forward.clone();
        reversed.reverse();

        let estimator = estimator();
        assert_eq!(
            estimator.estimate(61.0, &forward),
            estimator.estimate(61.0, &reversed)
        );
    }

    #[test]
    fn extreme_gaps_stay_within_bounds() {
        let records = history(&[(2024, 99.0), (2023, 98.0)]);
        let estimate = estimator().estimate(0.0, &records);
        assert_interval_valid(&estimate);

        let estimate = estimator().estimate(1_000.0, &history(&[(2024, 1.0)]));
        assert_interval_valid(&estimate);
    }
}
