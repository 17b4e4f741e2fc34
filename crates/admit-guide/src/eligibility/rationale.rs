use super::domain::{Category, Program};
use super::estimator::{EligibilityEstimate, EstimateModel, Trend};
use super::normalizer::CompositeScore;

/// Plain-language explanation of a single program estimate.
pub fn explain(
    composite: &CompositeScore,
    utme_score: u16,
    program: &Program,
    estimate: &EligibilityEstimate,
    category: Category,
) -> String {
    let mut parts = vec![format!(
        "Your composite score ({:.2}) is based on a UTME score of {} and O-level points of {:.2}.",
        composite.value, utme_score, composite.olevel_aggregate
    )];

    match (estimate.features.latest_year, estimate.features.latest_cutoff) {
        (Some(year), Some(cutoff)) => {
            let difference = composite.value - cutoff;
            let direction = if difference >= 0.0 { "above" } else { "below" };
            parts.push(format!(
                "This is {:.1} points {} the {} cutoff ({:.1}) for {} at {}.",
                difference.abs(),
                direction,
                year,
                cutoff,
                program.name,
                program.institution_name
            ));
        }
        _ => parts.push(format!(
            "No historical cutoff data is available for {} at {}.",
            program.name, program.institution_name
        )),
    }

    match estimate.features.trend {
        Trend::Increasing => parts.push("Cutoffs for this program have been rising.".to_string()),
        Trend::Decreasing => parts.push("Cutoffs for this program have been falling.".to_string()),
        Trend::Stable => {}
    }

    let percentage = (estimate.probability * 100.0).round();
    match estimate.model {
        EstimateModel::Logistic => parts.push(format!(
            "Based on historical data, your estimated admission probability is {percentage:.0}%."
        )),
        EstimateModel::Fallback => parts.push(format!(
            "Without historical data the estimate defaults to {percentage:.0}% and should be treated with caution."
        )),
    }

    parts.push(format!(
        "This is considered a {} choice.",
        category.label().to_ascii_uppercase()
    ));

    parts.join(" ")
}
