//! Model adapters and probability post-processing

pub mod loader;
pub mod logistic;
pub mod onnx;
pub mod scoreable;
pub mod scorer;

pub use loader::ModelLoader;
pub use logistic::LogisticModel;
pub use onnx::OnnxModel;
pub use scoreable::{ClassProbabilities, Scoreable};
pub use scorer::{calibrate_probability, Scorer};
