//! Model artifact loader

use super::logistic::LogisticModel;
use super::onnx::OnnxModel;
use super::scoreable::Scoreable;
use crate::error::{ServiceError, ServiceResult};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Adapts a model artifact on disk to [`Scoreable`], picking the adapter
/// from the file extension.
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a loader using one ONNX thread
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a loader with the given ONNX intra-op threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load and adapt a model, failing fast when the artifact is missing or
    /// its format is unsupported.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> ServiceResult<Arc<dyn Scoreable>> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading model from disk");

        if !path.is_file() {
            return Err(ServiceError::ModelLoad(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let model: Arc<dyn Scoreable> = match extension.as_deref() {
            Some("onnx") => Arc::new(OnnxModel::load(path, self.onnx_threads)?),
            Some("json") => {
                let model = LogisticModel::load(path)?;
                info!(
                    model = model.name(),
                    coefficients = model.coefficient_count(),
                    "Logistic model loaded"
                );
                Arc::new(model)
            }
            _ => {
                return Err(ServiceError::ModelLoad(format!(
                    "unsupported model format: {} (expected .onnx or .json)",
                    path.display()
                )))
            }
        };

        Ok(model)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
