//! Configuration management for the churn prediction service

use anyhow::{ensure, Context, Result};
use config::{Config, ConfigBuilder, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Default calibration multiplier applied to the raw churn probability
pub const DEFAULT_CALIBRATION_FACTOR: f64 = 2.43;

/// Default decision threshold, compared against the raw probability
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.3;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub scoring: ScoringConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Allowed CORS origins (empty = any origin)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Static artifacts loaded at startup and on reload
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Reference dataset (CSV with header row) the schema is derived from
    pub data_file: PathBuf,
    /// Serialized classifier (`.onnx` or `.json` logistic export)
    pub model_path: PathBuf,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Post-processing applied to the model output
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Linear multiplier for the reported confidence, capped at 1.0
    pub calibration_factor: f64,
    /// When false the raw probability is reported unchanged
    #[serde(default = "default_true")]
    pub calibrate_output: bool,
    /// Churn is predicted when the raw probability reaches this value
    pub decision_threshold: f64,
}

fn default_true() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

/// Periodic metrics summary
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between summaries; 0 disables the reporter
    pub report_interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from `CHURN_CONFIG` or the default path, then
    /// apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("CHURN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path. A missing file is not an
    /// error; compiled defaults and environment overrides still apply.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let builder = Self::defaults()?
            .add_source(File::from(path.as_ref()).required(false))
            .set_override_option("scoring.calibration_factor", env_value("CALIBRATION_FACTOR"))?
            .set_override_option("logging.level", env_value("LOG_LEVEL").map(|v| v.to_lowercase()))?
            .set_override_option("artifacts.data_file", env_value("DATA_FILE"))?
            .set_override_option("artifacts.model_path", env_value("MODEL_PATH"))?
            .set_override_option("server.port", env_value("PORT"))?;

        let config: AppConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 7860_i64)?
            .set_default("server.cors_origins", Vec::<String>::new())?
            .set_default("artifacts.data_file", "Telco-Customer-Churn.csv")?
            .set_default("artifacts.model_path", "model.onnx")?
            .set_default("artifacts.onnx_threads", 1_i64)?
            .set_default("scoring.calibration_factor", DEFAULT_CALIBRATION_FACTOR)?
            .set_default("scoring.calibrate_output", true)?
            .set_default("scoring.decision_threshold", DEFAULT_DECISION_THRESHOLD)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("metrics.report_interval_secs", 60_i64)?)
    }

    /// Reject values that would make every prediction meaningless
    pub fn validate(&self) -> Result<()> {
        let factor = self.scoring.calibration_factor;
        ensure!(
            factor.is_finite() && factor > 0.0,
            "calibration_factor must be a positive number, got {factor}"
        );
        let threshold = self.scoring.decision_threshold;
        ensure!(
            (0.0..=1.0).contains(&threshold),
            "decision_threshold must lie in [0, 1], got {threshold}"
        );
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 7860,
                cors_origins: Vec::new(),
            },
            artifacts: ArtifactsConfig {
                data_file: PathBuf::from("Telco-Customer-Churn.csv"),
                model_path: PathBuf::from("model.onnx"),
                onnx_threads: 1,
            },
            scoring: ScoringConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            calibration_factor: DEFAULT_CALIBRATION_FACTOR,
            calibrate_output: true,
            decision_threshold: DEFAULT_DECISION_THRESHOLD,
        }
    }
}
