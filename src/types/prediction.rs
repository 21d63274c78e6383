//! Prediction results and the wire response

use serde::{Deserialize, Serialize};

/// Outcome of the decision rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Churn,
    Continue,
}

impl Classification {
    /// Classify a raw (uncalibrated) churn probability
    pub fn from_raw_probability(raw: f64, threshold: f64) -> Self {
        if raw >= threshold {
            Classification::Churn
        } else {
            Classification::Continue
        }
    }

    /// Human readable label returned to clients
    pub fn message(&self) -> &'static str {
        match self {
            Classification::Churn => "This customer is likely to churn.",
            Classification::Continue => "This customer is likely to continue",
        }
    }
}

/// Result of scoring one aligned feature row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Decision taken on the raw probability
    pub classification: Classification,
    /// Probability mass the model assigned to the churn class
    pub raw_probability: f64,
    /// Raw probability after the linear calibration, capped at 1.0
    pub calibrated_probability: f64,
    /// Calibrated probability as a percentage, rounded to 2 decimals
    pub confidence_pct: f64,
    /// Threshold the raw probability was compared against
    pub threshold: f64,
    /// Snapshot that produced this result
    pub snapshot_version: u64,
}

impl PredictionResult {
    /// Render the response body served by `/predict`
    pub fn to_response(&self) -> PredictionResponse {
        PredictionResponse {
            prediction: self.classification.message().to_string(),
            confidence: format!("{}%", format_percent(self.confidence_pct)),
            threshold: self.threshold,
        }
    }
}

/// Body of a successful `/predict` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: String,
    pub confidence: String,
    pub threshold: f64,
}

/// Shortest round-trip rendering, keeping one decimal on whole numbers
/// (`100.0`, `24.3`, `47.12`).
fn format_percent(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
