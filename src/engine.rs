//! Prediction engine: owns the current schema/model snapshot and runs the
//! normalize → align → score pipeline against it.

use crate::config::{AppConfig, ArtifactsConfig, ScoringConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::features::{FeatureAligner, RecordNormalizer, ReferenceSchema, SchemaBuilder};
use crate::models::{ModelLoader, Scoreable, Scorer};
use crate::types::customer::CustomerRecord;
use crate::types::prediction::PredictionResult;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{error, info};

/// A schema and the model trained against it, published together.
pub struct Snapshot {
    /// Monotonic publication counter, starting at 1
    pub version: u64,
    pub schema: Arc<ReferenceSchema>,
    pub model: Arc<dyn Scoreable>,
    pub loaded_at: DateTime<Utc>,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("version", &self.version)
            .field("columns", &self.schema.len())
            .field("model", &self.model.name())
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Churn prediction engine.
///
/// Starts unready. [`ChurnEngine::load`] builds a new schema and model
/// completely before swapping a single `Arc<Snapshot>`; a request clones
/// that `Arc` once and uses it throughout, so it never pairs a schema with
/// a model from a different load.
pub struct ChurnEngine {
    artifacts: ArtifactsConfig,
    schema_builder: SchemaBuilder,
    model_loader: ModelLoader,
    normalizer: RecordNormalizer,
    aligner: FeatureAligner,
    scorer: Scorer,
    current: RwLock<Option<Arc<Snapshot>>>,
    /// Serializes loads so versions are published in order
    load_lock: Mutex<()>,
    next_version: AtomicU64,
}

impl ChurnEngine {
    /// Create an unready engine from configuration
    pub fn new(config: &AppConfig) -> Self {
        Self::with_parts(config.artifacts.clone(), config.scoring.clone())
    }

    /// Create an unready engine from artifact and scoring settings
    pub fn with_parts(artifacts: ArtifactsConfig, scoring: ScoringConfig) -> Self {
        let model_loader = ModelLoader::with_threads(artifacts.onnx_threads);
        Self {
            artifacts,
            schema_builder: SchemaBuilder::new(),
            model_loader,
            normalizer: RecordNormalizer::new(),
            aligner: FeatureAligner::new(),
            scorer: Scorer::new(scoring),
            current: RwLock::new(None),
            load_lock: Mutex::new(()),
            next_version: AtomicU64::new(1),
        }
    }

    /// Build the schema and load the model from the configured artifacts,
    /// then publish them. On failure the previous snapshot (if any) stays
    /// in service.
    pub fn load(&self) -> ServiceResult<Arc<Snapshot>> {
        let _guard = self
            .load_lock
            .lock()
            .map_err(|e| ServiceError::Internal(format!("Lock error: {e}")))?;

        let built = self
            .schema_builder
            .build_from_path(&self.artifacts.data_file)
            .and_then(|schema| {
                let model = self.model_loader.load(&self.artifacts.model_path)?;
                Ok((schema, model))
            });

        match built {
            Ok((schema, model)) => self.publish(Arc::new(schema), model),
            Err(e) => {
                error!(error = %e, ready = self.is_ready(), "Loading schema and model failed");
                Err(e)
            }
        }
    }

    /// Reload both artifacts; alias of [`ChurnEngine::load`] that logs the
    /// replaced version.
    pub fn reload(&self) -> ServiceResult<Arc<Snapshot>> {
        let previous = self.snapshot_version();
        let snapshot = self.load()?;
        info!(
            previous_version = ?previous,
            version = snapshot.version,
            "Data and model reloaded"
        );
        Ok(snapshot)
    }

    /// Publish an already-built schema/model pair
    pub fn install(
        &self,
        schema: Arc<ReferenceSchema>,
        model: Arc<dyn Scoreable>,
    ) -> ServiceResult<Arc<Snapshot>> {
        let _guard = self
            .load_lock
            .lock()
            .map_err(|e| ServiceError::Internal(format!("Lock error: {e}")))?;
        self.publish(schema, model)
    }

    fn publish(
        &self,
        schema: Arc<ReferenceSchema>,
        model: Arc<dyn Scoreable>,
    ) -> ServiceResult<Arc<Snapshot>> {
        let snapshot = Arc::new(Snapshot {
            version: self.next_version.fetch_add(1, Ordering::Relaxed),
            schema,
            model,
            loaded_at: Utc::now(),
        });

        {
            let mut current = self
                .current
                .write()
                .map_err(|e| ServiceError::Internal(format!("Lock error: {e}")))?;
            *current = Some(Arc::clone(&snapshot));
        }

        info!(
            version = snapshot.version,
            columns = snapshot.schema.len(),
            model = snapshot.model.name(),
            "Snapshot published"
        );
        Ok(snapshot)
    }

    /// Current snapshot, or `NotReady` before the first successful load
    pub fn snapshot(&self) -> ServiceResult<Arc<Snapshot>> {
        self.current
            .read()
            .map_err(|e| ServiceError::Internal(format!("Lock error: {e}")))?
            .clone()
            .ok_or(ServiceError::NotReady)
    }

    /// Whether a snapshot has been published
    pub fn is_ready(&self) -> bool {
        self.snapshot().is_ok()
    }

    /// Version of the current snapshot
    pub fn snapshot_version(&self) -> Option<u64> {
        self.snapshot().ok().map(|s| s.version)
    }

    /// Ordered one-hot columns of the current schema
    pub fn features(&self) -> ServiceResult<Arc<ReferenceSchema>> {
        self.snapshot().map(|s| Arc::clone(&s.schema))
    }

    /// Scorer used for predictions
    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Score one customer record against a single snapshot
    pub fn predict(&self, record: &CustomerRecord) -> ServiceResult<PredictionResult> {
        let snapshot = self.snapshot()?;
        let normalized = self.normalizer.normalize(record)?;
        let aligned = self.aligner.align(&normalized, Some(&snapshot.schema))?;
        self.scorer.score(&*snapshot.model, &aligned, snapshot.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogisticModel;
    use crate::types::prediction::Classification;
    use std::collections::HashMap;
    use std::path::Path;

    const DATASET_A: &str = "\
customerID,gender,tenure,Contract,Churn
a,Female,1,Month-to-month,Yes
b,Male,40,Two year,No
";

    const DATASET_B: &str = "\
customerID,gender,tenure,PaymentMethod,Churn
a,Female,5,Electronic check,Yes
b,Male,70,Mailed check,No
";

    // sigmoid(-3 + 2) with schema A; sigmoid(-3) if paired with schema B
    const MODEL_A: &str = r#"{ "intercept": -3.0, "coefficients": { "Contract_Month-to-month": 2.0 } }"#;
    // sigmoid(1 + 1) with schema B; sigmoid(1) if paired with schema A
    const MODEL_B: &str = r#"{ "intercept": 1.0, "coefficients": { "PaymentMethod_Electronic check": 1.0 } }"#;

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    fn write_artifacts(dir: &Path, dataset: &str, model: &str) -> ArtifactsConfig {
        let data_file = dir.join("reference.csv");
        let model_path = dir.join("churn.json");
        std::fs::write(&data_file, dataset).unwrap();
        std::fs::write(&model_path, model).unwrap();
        ArtifactsConfig {
            data_file,
            model_path,
            onnx_threads: 1,
        }
    }

    fn pair(dataset: &str, model: &str) -> (Arc<ReferenceSchema>, Arc<dyn Scoreable>) {
        let schema = SchemaBuilder::new().build_from_reader(dataset.as_bytes()).unwrap();
        let model = LogisticModel::from_json_str("pair", model).unwrap();
        (Arc::new(schema), Arc::new(model))
    }

    #[test]
    fn test_unready_engine_refuses_work() {
        let engine = ChurnEngine::new(&AppConfig::default());
        assert!(!engine.is_ready());
        assert!(matches!(engine.features(), Err(ServiceError::NotReady)));
        assert!(matches!(
            engine.predict(&CustomerRecord::sample()),
            Err(ServiceError::NotReady)
        ));
    }

    #[test]
    fn test_load_and_predict() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = write_artifacts(dir.path(), DATASET_A, MODEL_A);
        let engine = ChurnEngine::with_parts(artifacts, ScoringConfig::default());

        let snapshot = engine.load().unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(
            engine.features().unwrap().columns(),
            &[
                "gender_Female",
                "gender_Male",
                "Contract_Month-to-month",
                "Contract_Two year",
                "tenure_group_1-12",
                "tenure_group_37-48",
            ]
        );

        let result = engine.predict(&CustomerRecord::sample()).unwrap();
        assert!((result.raw_probability - sigmoid(-1.0)).abs() < 1e-9);
        assert_eq!(result.classification, Classification::Continue);
        assert_eq!(result.snapshot_version, 1);
    }

    #[test]
    fn test_failed_load_keeps_unready() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifacts = write_artifacts(dir.path(), DATASET_A, MODEL_A);
        artifacts.model_path = dir.path().join("missing.onnx");
        let engine = ChurnEngine::with_parts(artifacts, ScoringConfig::default());

        let err = engine.load().unwrap_err();
        assert!(err.is_initialization());
        assert!(!engine.is_ready());
    }

    #[test]
    fn test_failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = write_artifacts(dir.path(), DATASET_A, MODEL_A);
        let engine = ChurnEngine::with_parts(artifacts.clone(), ScoringConfig::default());
        engine.load().unwrap();

        std::fs::write(&artifacts.data_file, "gender\nFemale\n").unwrap();
        assert!(engine.reload().is_err());
        assert_eq!(engine.snapshot_version(), Some(1));
        assert!(engine.predict(&CustomerRecord::sample()).is_ok());
    }

    #[test]
    fn test_reload_picks_up_new_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = write_artifacts(dir.path(), DATASET_A, MODEL_A);
        let engine = ChurnEngine::with_parts(artifacts, ScoringConfig::default());
        engine.load().unwrap();

        write_artifacts(dir.path(), DATASET_B, MODEL_B);
        let snapshot = engine.reload().unwrap();
        assert_eq!(snapshot.version, 2);
        assert!(engine.features().unwrap().position("Contract_Two year").is_none());

        let result = engine.predict(&CustomerRecord::sample()).unwrap();
        assert!((result.raw_probability - sigmoid(2.0)).abs() < 1e-9);
        assert_eq!(result.classification, Classification::Churn);
    }

    #[test]
    fn test_poisoned_snapshot_lock_is_reported() {
        let engine = ChurnEngine::new(&AppConfig::default());
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _current = engine.current.write().unwrap();
            panic!("writer died holding the snapshot lock");
        }));

        assert!(matches!(engine.snapshot(), Err(ServiceError::Internal(_))));
        assert!(!engine.is_ready());
    }

    #[test]
    fn test_bad_tenure_is_invalid_input() {
        let engine = ChurnEngine::new(&AppConfig::default());
        let (schema, model) = pair(DATASET_A, MODEL_A);
        engine.install(schema, model).unwrap();

        let mut record = CustomerRecord::sample();
        record.tenure = Some(serde_json::json!("forever"));
        assert!(matches!(
            engine.predict(&record),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_concurrent_predict_and_reload_never_tear() {
        let engine = ChurnEngine::new(&AppConfig::default());
        let (schema_a, model_a) = pair(DATASET_A, MODEL_A);
        let (schema_b, model_b) = pair(DATASET_B, MODEL_B);
        engine.install(Arc::clone(&schema_a), Arc::clone(&model_a)).unwrap();

        let allowed = [sigmoid(-1.0), sigmoid(2.0)];
        let torn = [sigmoid(-3.0), sigmoid(1.0)];

        let mut versions: HashMap<u64, f64> = HashMap::new();
        std::thread::scope(|scope| {
            let engine = &engine;
            let reloader = scope.spawn(move || {
                for i in 0..500 {
                    if i % 2 == 0 {
                        engine.install(Arc::clone(&schema_b), Arc::clone(&model_b)).unwrap();
                    } else {
                        engine.install(Arc::clone(&schema_a), Arc::clone(&model_a)).unwrap();
                    }
                }
            });

            let predictors: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(move || {
                        let record = CustomerRecord::sample();
                        (0..500)
                            .map(|_| engine.predict(&record).unwrap())
                            .map(|r| (r.snapshot_version, r.raw_probability))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            reloader.join().unwrap();
            for handle in predictors {
                for (version, raw) in handle.join().unwrap() {
                    assert!(
                        allowed.iter().any(|p| (p - raw).abs() < 1e-9),
                        "torn snapshot produced {raw}"
                    );
                    assert!(torn.iter().all(|p| (p - raw).abs() > 1e-9));
                    // a version always maps to a single pair
                    let seen = versions.entry(version).or_insert(raw);
                    assert!((*seen - raw).abs() < 1e-12);
                }
            }
        });
    }
}
