//! Logistic regression exported as JSON coefficients keyed by feature name

use super::scoreable::{ClassProbabilities, Scoreable};
use crate::error::{ServiceError, ServiceResult};
use crate::features::AlignedFeatures;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// On-disk layout:
///
/// ```json
/// { "intercept": -1.2, "coefficients": { "Contract_Month-to-month": 0.9 } }
/// ```
#[derive(Debug, Clone, Deserialize)]
struct LogisticArtifact {
    intercept: f64,
    coefficients: HashMap<String, f64>,
}

/// Binary logistic model evaluated by column name, so it is independent of
/// the schema's column order.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    name: String,
    intercept: f64,
    coefficients: HashMap<String, f64>,
}

impl LogisticModel {
    /// Build a model from weights, rejecting non-finite values
    pub fn new(name: impl Into<String>, intercept: f64, coefficients: HashMap<String, f64>) -> ServiceResult<Self> {
        if !intercept.is_finite() {
            return Err(ServiceError::ModelLoad("intercept is not finite".to_string()));
        }
        if let Some((column, _)) = coefficients.iter().find(|(_, w)| !w.is_finite()) {
            return Err(ServiceError::ModelLoad(format!(
                "coefficient for '{column}' is not finite"
            )));
        }
        Ok(Self {
            name: name.into(),
            intercept,
            coefficients,
        })
    }

    /// Parse a model from its JSON form
    pub fn from_json_str(name: &str, json: &str) -> ServiceResult<Self> {
        let artifact: LogisticArtifact = serde_json::from_str(json)
            .map_err(|e| ServiceError::ModelLoad(format!("invalid logistic model: {e}")))?;
        Self::new(name, artifact.intercept, artifact.coefficients)
    }

    /// Load a model from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> ServiceResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::ModelLoad(format!("cannot read {}: {}", path.display(), e)))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("logistic");
        Self::from_json_str(name, &json)
    }

    /// Number of named coefficients
    pub fn coefficient_count(&self) -> usize {
        self.coefficients.len()
    }
}

impl Scoreable for LogisticModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, row: &AlignedFeatures) -> ServiceResult<ClassProbabilities> {
        let logit = row.iter().fold(self.intercept, |acc, (column, value)| {
            acc + self.coefficients.get(column).copied().unwrap_or(0.0) * f64::from(value)
        });
        ClassProbabilities::binary(sigmoid(logit))
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
