//! ONNX classifier adapter (scikit-learn models exported with skl2onnx)

use super::scoreable::{ClassProbabilities, Scoreable};
use crate::error::{ServiceError, ServiceResult};
use crate::features::AlignedFeatures;
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// ONNX Runtime session exposing a class-probability output
pub struct OnnxModel {
    name: String,
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxModel {
    /// Load a model and resolve its probability output, failing when the
    /// graph has none.
    pub fn load<P: AsRef<Path>>(path: P, intra_threads: usize) -> ServiceResult<Self> {
        let path = path.as_ref();
        Self::open(path, intra_threads)
            .map_err(|e| ServiceError::ModelLoad(format!("{}: {:#}", path.display(), e)))
    }

    fn open(path: &Path, intra_threads: usize) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx")
            .to_string();

        info!(model = %name, path = %path.display(), threads = intra_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(path)
            .context("failed to create ONNX session")?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("model declares no inputs")?;

        // skl2onnx classifiers emit `output_label` and `output_probability`
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .context("model does not expose a probability output")?;

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    fn run(&self, features: &[f32]) -> Result<Vec<f64>> {
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_vec())).context("failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        extract_probabilities(&outputs, &self.output_name)
    }
}

impl Scoreable for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, row: &AlignedFeatures) -> ServiceResult<ClassProbabilities> {
        let probabilities = self
            .run(row.values())
            .map_err(|e| ServiceError::Scoring(format!("{}: {:#}", self.name, e)))?;
        debug!(model = %self.name, probabilities = ?probabilities, "ONNX inference complete");
        ClassProbabilities::new(probabilities)
    }
}

/// Class probabilities of the first row, from either a `[batch, classes]`
/// tensor or a `seq(map(int64, float))` ZipMap output.
fn extract_probabilities(outputs: &SessionOutputs, output_name: &str) -> Result<Vec<f64>> {
    let output = outputs
        .get(output_name)
        .with_context(|| format!("output '{output_name}' missing from inference result"))?;

    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        let classes = match dims.as_slice() {
            [_, classes] | [classes] => *classes as usize,
            _ => anyhow::bail!("unexpected probability tensor shape {dims:?}"),
        };
        anyhow::ensure!(data.len() >= classes, "probability tensor is truncated");
        return Ok(data[..classes].iter().map(|&p| f64::from(p)).collect());
    }

    if DynSequenceValueType::can_downcast(&output.dtype()) {
        return extract_from_sequence_map(output);
    }

    anyhow::bail!("output '{output_name}' is neither a tensor nor a sequence of maps")
}

fn extract_from_sequence_map(output: &DynValue) -> Result<Vec<f64>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("failed to downcast to sequence: {e}"))?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    let first = maps.first().context("empty probability sequence")?;

    let mut pairs = first.try_extract_key_values::<i64, f32>()?;
    pairs.sort_by_key(|(class_id, _)| *class_id);

    // class ids are dense 0..n for binary classifiers
    for (expected, (class_id, _)) in pairs.iter().enumerate() {
        anyhow::ensure!(
            *class_id == expected as i64,
            "non-contiguous class ids in probability map"
        );
    }
    Ok(pairs.into_iter().map(|(_, p)| f64::from(p)).collect())
}
