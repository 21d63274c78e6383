//! Probability post-processing: calibration and decision rule

use super::scoreable::Scoreable;
use crate::config::ScoringConfig;
use crate::error::ServiceResult;
use crate::features::AlignedFeatures;
use crate::types::prediction::{Classification, PredictionResult};
use tracing::info;

/// Scale a raw probability by `factor`, capped at 1.0.
///
/// This is a fixed post-hoc linear rescaling of the model output, not a
/// probabilistic recalibration (no Platt scaling, no isotonic fit); it only
/// shifts the reported confidence of a model known to under-estimate churn.
pub fn calibrate_probability(raw: f64, factor: f64) -> f64 {
    (raw * factor).min(1.0)
}

/// Percentage rounded to two decimals from the exact binary value
fn to_percent(probability: f64) -> f64 {
    let pct = probability * 100.0;
    format!("{pct:.2}").parse().unwrap_or(pct)
}

/// Turns model probabilities into a [`PredictionResult`].
///
/// The decision threshold is applied to the raw probability while the
/// reported confidence is the calibrated one.
#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    /// Create a scorer
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Decision threshold applied to the raw probability
    pub fn threshold(&self) -> f64 {
        self.config.decision_threshold
    }

    /// Calibration as configured; the identity when calibration is off
    pub fn calibrate(&self, raw: f64) -> f64 {
        if self.config.calibrate_output {
            calibrate_probability(raw, self.config.calibration_factor)
        } else {
            raw
        }
    }

    /// Build a result from the raw churn probability
    pub fn evaluate(&self, raw: f64, snapshot_version: u64) -> PredictionResult {
        let calibrated = self.calibrate(raw);
        PredictionResult {
            classification: Classification::from_raw_probability(raw, self.config.decision_threshold),
            raw_probability: raw,
            calibrated_probability: calibrated,
            confidence_pct: to_percent(calibrated),
            threshold: self.config.decision_threshold,
            snapshot_version,
        }
    }

    /// Run the model on an aligned row and post-process its output
    pub fn score(
        &self,
        model: &dyn Scoreable,
        row: &AlignedFeatures,
        snapshot_version: u64,
    ) -> ServiceResult<PredictionResult> {
        let raw = model.predict_proba(row)?.positive();
        let result = self.evaluate(raw, snapshot_version);

        info!(
            model = model.name(),
            raw_probability = format!("{:.4}", result.raw_probability),
            calibrated = format!("{:.4}", result.calibrated_probability),
            prediction = result.classification.message(),
            confidence = result.confidence_pct,
            "Prediction scored"
        );

        Ok(result)
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
