//! Churn Prediction Service Library
//!
//! Loads a reference dataset and a pre-trained classifier, aligns posted
//! customer records onto the model's one-hot feature layout and returns a
//! calibrated churn prediction over HTTP.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod types;

pub use config::AppConfig;
pub use engine::{ChurnEngine, Snapshot};
pub use error::{ServiceError, ServiceResult};
pub use features::{FeatureAligner, RecordNormalizer, ReferenceSchema, SchemaBuilder};
pub use metrics::ServiceMetrics;
pub use models::{ModelLoader, Scoreable, Scorer};
pub use types::{CustomerRecord, PredictionResponse, PredictionResult};
