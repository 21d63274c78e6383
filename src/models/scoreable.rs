//! Contract every loaded classifier is adapted to

use crate::error::{ServiceError, ServiceResult};
use crate::features::AlignedFeatures;

/// Index of the churn class in a binary classifier's output
pub const POSITIVE_CLASS: usize = 1;

/// Per-class probabilities for one row
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities(Vec<f64>);

impl ClassProbabilities {
    /// Validate a probability vector: at least two classes, each value
    /// finite and within [0, 1].
    pub fn new(values: Vec<f64>) -> ServiceResult<Self> {
        if values.len() <= POSITIVE_CLASS {
            return Err(ServiceError::Scoring(format!(
                "expected at least 2 class probabilities, got {}",
                values.len()
            )));
        }
        if let Some(bad) = values
            .iter()
            .find(|p| !p.is_finite() || !(0.0..=1.0).contains(*p))
        {
            return Err(ServiceError::Scoring(format!("invalid probability {bad}")));
        }
        Ok(Self(values))
    }

    /// Binary output from the positive-class probability alone
    pub fn binary(positive: f64) -> ServiceResult<Self> {
        Self::new(vec![1.0 - positive, positive])
    }

    /// Probability mass of the churn class
    pub fn positive(&self) -> f64 {
        self.0[POSITIVE_CLASS]
    }

    /// All class probabilities
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// A classifier that, given a named numeric row, returns class
/// probabilities.
pub trait Scoreable: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &str;

    fn predict_proba(&self, row: &AlignedFeatures) -> ServiceResult<ClassProbabilities>;
}
