use super::config::ClassificationConfig;
use super::domain::Category;

/// Maps a probability onto the safe/target/reach bands.
///
/// Bands are closed below and open above, so `[0, 1]` is partitioned with
/// no gap or overlap. NaN never clears a threshold and lands in `Reach`.
pub struct ProgramClassifier {
    config: ClassificationConfig,
}

impl ProgramClassifier {
    pub(crate) fn new(config: ClassificationConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, probability: f64) -> Category {
        if probability >= self.config.safe_min {
            Category::Safe
        } else if probability >= self.config.target_min {
            Category::Target
        } else {
            Category::Reach
        }
    }
}
