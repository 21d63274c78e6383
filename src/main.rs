//! Churn Prediction Service - Main Entry Point
//!
//! Loads the reference dataset and model, then serves predictions over HTTP.

use anyhow::{Context, Result};
use churn_prediction_service::{
    api::{build_router, ApiState},
    config::{AppConfig, LoggingConfig},
    engine::ChurnEngine,
    metrics::{MetricsReporter, ServiceMetrics},
    models::Scoreable,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so the level is known
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Churn Prediction Service");
    info!(
        data_file = %config.artifacts.data_file.display(),
        model_path = %config.artifacts.model_path.display(),
        calibration_factor = config.scoring.calibration_factor,
        calibrate_output = config.scoring.calibrate_output,
        decision_threshold = config.scoring.decision_threshold,
        "Configuration loaded"
    );

    // Startup load is fatal: the service never serves without a snapshot
    let engine = Arc::new(ChurnEngine::new(&config));
    let loader = engine.clone();
    let snapshot = tokio::task::spawn_blocking(move || loader.load())
        .await?
        .context("Initial schema and model load failed")?;
    info!(
        version = snapshot.version,
        features = snapshot.schema.len(),
        model = snapshot.model.name(),
        "Schema and model ready"
    );

    let metrics = Arc::new(ServiceMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = ApiState::new(engine, metrics.clone());
    let app = build_router(state, &config.server.cors_origins);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Listening for prediction requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Service shutting down...");
    metrics.log_summary();

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
