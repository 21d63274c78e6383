//! Record normalization: per-field coercion of a posted customer record
//! into the categorical shape used by the reference schema.

use super::tenure::TenureBucket;
use super::{CATEGORICAL_FEATURES, TENURE_GROUP};
use crate::error::{ServiceError, ServiceResult};
use crate::types::customer::CustomerRecord;
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of a lenient coercion
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced<T> {
    /// The input was usable as-is
    Parsed(T),
    /// The input was unusable and a default was substituted
    Defaulted { value: T, reason: String },
}

impl<T> Coerced<T> {
    /// Unwrap the coerced value
    pub fn value(self) -> T {
        match self {
            Coerced::Parsed(value) | Coerced::Defaulted { value, .. } => value,
        }
    }

    /// Whether a default replaced the input
    pub fn is_defaulted(&self) -> bool {
        matches!(self, Coerced::Defaulted { .. })
    }
}

/// `TotalCharges` as a float; anything unparseable becomes 0.0
pub fn coerce_total_charges(value: Option<&Value>) -> Coerced<f64> {
    let defaulted = |reason: String| Coerced::Defaulted { value: 0.0, reason };
    match value {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) => Coerced::Parsed(v),
            None => defaulted(format!("unrepresentable number {n}")),
        },
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) => Coerced::Parsed(v),
            Err(_) => defaulted(format!("'{s}' is not a number")),
        },
        Some(other) => defaulted(format!("unexpected value {other}")),
        None => defaulted("field missing".to_string()),
    }
}

/// `SeniorCitizen` as an integer flag.
///
/// Integers pass through unchanged, "yes" (any case, surrounding
/// whitespace ignored) is 1 and every other string is 0.
pub fn coerce_senior_citizen(value: &Value) -> Coerced<i64> {
    match value {
        Value::String(s) => {
            let flag = s.trim().to_lowercase();
            match flag.as_str() {
                "yes" => Coerced::Parsed(1),
                "no" => Coerced::Parsed(0),
                _ => Coerced::Defaulted {
                    value: 0,
                    reason: format!("'{s}' is neither yes nor no"),
                },
            }
        }
        Value::Number(n) => match integral(n) {
            Some(v) => Coerced::Parsed(v),
            None => Coerced::Defaulted {
                value: 0,
                reason: format!("{n} is not an integer flag"),
            },
        },
        Value::Bool(b) => Coerced::Parsed(i64::from(*b)),
        other => Coerced::Defaulted {
            value: 0,
            reason: format!("unexpected value {other}"),
        },
    }
}

/// Tenure in whole months. Unlike the other fields this is strict: the
/// bucket feature cannot be derived without it.
pub fn coerce_tenure(value: Option<&Value>) -> ServiceResult<i64> {
    match value {
        Some(Value::Number(n)) => integral(n)
            .ok_or_else(|| ServiceError::InvalidInput(format!("tenure {n} is not a whole number of months"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ServiceError::InvalidInput(format!("tenure '{s}' is not an integer"))),
        Some(Value::Null) | None => Err(ServiceError::InvalidInput("tenure is required".to_string())),
        Some(other) => Err(ServiceError::InvalidInput(format!(
            "tenure {other} is not an integer"
        ))),
    }
}

/// String form of a categorical value, as the training encoder saw it
pub fn categorical_string(field: &str, value: &Value) -> ServiceResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(true) => Ok("True".to_string()),
        Value::Bool(false) => Ok("False".to_string()),
        Value::Null => Ok("nan".to_string()),
        Value::Array(_) | Value::Object(_) => Err(ServiceError::InvalidInput(format!(
            "{field} must be a string or number"
        ))),
    }
}

fn integral(n: &serde_json::Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

/// A record with every field in its encoded form.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub total_charges: f64,
    pub monthly_charges: Option<f64>,
    pub tenure_months: i64,
    pub tenure_bucket: TenureBucket,
    /// Present categorical fields, in encoding order
    categorical: Vec<(&'static str, String)>,
    /// Categorical fields absent from the input
    missing: Vec<&'static str>,
}

impl NormalizedRecord {
    /// Encoded value of a categorical field, if present
    pub fn get(&self, field: &str) -> Option<&str> {
        self.categorical
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Present categorical fields in encoding order
    pub fn categorical(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.categorical.iter().map(|(name, value)| (*name, value.as_str()))
    }

    /// Fields absent from the request
    pub fn missing_fields(&self) -> &[&'static str] {
        &self.missing
    }
}

/// Normalizes one [`CustomerRecord`] without failing on malformed
/// optional fields.
pub struct RecordNormalizer;

impl RecordNormalizer {
    /// Create a normalizer
    pub fn new() -> Self {
        Self
    }

    /// Coerce every field of a request record
    pub fn normalize(&self, record: &CustomerRecord) -> ServiceResult<NormalizedRecord> {
        let total_charges = match coerce_total_charges(record.total_charges.as_ref()) {
            Coerced::Parsed(v) => v,
            Coerced::Defaulted { value, reason } => {
                warn!(reason = %reason, "Invalid TotalCharges received, set to 0.0");
                value
            }
        };

        let tenure_months = coerce_tenure(record.tenure.as_ref())?;
        let tenure_bucket = TenureBucket::from_months(tenure_months);
        if tenure_bucket.is_out_of_range() {
            debug!(tenure = tenure_months, "Tenure outside every bucket");
        }

        let mut categorical = Vec::with_capacity(CATEGORICAL_FEATURES.len());
        let mut missing = Vec::new();

        for field in CATEGORICAL_FEATURES {
            let encoded = match field {
                TENURE_GROUP => Some(tenure_bucket.label().to_string()),
                "SeniorCitizen" => record
                    .senior_citizen
                    .as_ref()
                    .filter(|v| !v.is_null())
                    .map(|v| {
                        let flag = coerce_senior_citizen(v);
                        if let Coerced::Defaulted { reason, .. } = &flag {
                            debug!(reason = %reason, "SeniorCitizen coerced to 0");
                        }
                        flag.value().to_string()
                    }),
                _ => record
                    .categorical(field)
                    .map(|v| categorical_string(field, v))
                    .transpose()?,
            };
            match encoded {
                Some(value) => categorical.push((field, value)),
                None => missing.push(field),
            }
        }

        if !missing.is_empty() {
            warn!(
                missing = ?missing,
                "Categorical features missing in the input will be skipped"
            );
        }

        Ok(NormalizedRecord {
            total_charges,
            monthly_charges: record.monthly_charges,
            tenure_months,
            tenure_bucket,
            categorical,
            missing,
        })
    }
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
