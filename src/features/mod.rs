//! Feature preparation: reference schema, record normalization and
//! one-hot alignment.
//!
//! The schema builder and the aligner share the same field list and the
//! same column naming so that a live record encodes onto exactly the
//! columns the model was trained with.

pub mod aligner;
pub mod normalizer;
pub mod schema;
pub mod tenure;

pub use aligner::{AlignedFeatures, FeatureAligner};
pub use normalizer::{Coerced, NormalizedRecord, RecordNormalizer};
pub use schema::{ReferenceSchema, SchemaBuilder};
pub use tenure::TenureBucket;

/// Name of the derived tenure bucket feature
pub const TENURE_GROUP: &str = "tenure_group";

/// Categorical fields one-hot encoded for the model, in encoding order.
pub const CATEGORICAL_FEATURES: [&str; 17] = [
    "gender",
    "SeniorCitizen",
    "Partner",
    "Dependents",
    "PhoneService",
    "MultipleLines",
    "InternetService",
    "OnlineSecurity",
    "OnlineBackup",
    "DeviceProtection",
    "TechSupport",
    "StreamingTV",
    "StreamingMovies",
    "Contract",
    "PaperlessBilling",
    "PaymentMethod",
    TENURE_GROUP,
];

/// One-hot column name for a field/value pair, e.g. `Contract_Month-to-month`
pub fn one_hot_column(field: &str, value: &str) -> String {
    format!("{field}_{value}")
}
