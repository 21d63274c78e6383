//! HTTP request handlers.

use super::{ApiError, ApiState};
use crate::error::ServiceError;
use crate::types::customer::CustomerRecord;
use crate::types::prediction::PredictionResponse;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Build all routes.
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/predict", post(predict))
        .route("/features", get(features))
        .route("/health", get(health_check))
        .route("/reload", post(reload))
}

/// Score one customer. Every failure, including an unready service, is a
/// 400 with the error text as detail.
async fn predict(
    State(state): State<ApiState>,
    payload: Result<Json<CustomerRecord>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::new_v4();

    let Json(record) = payload.map_err(|rejection| {
        state.metrics.record_failure();
        error!(%request_id, error = %rejection.body_text(), "Rejected prediction request body");
        ApiError::bad_request(rejection.body_text())
    })?;

    match state.engine.predict(&record) {
        Ok(result) => {
            state.metrics.record_prediction(start.elapsed(), &result);
            debug!(
                %request_id,
                version = result.snapshot_version,
                elapsed_us = start.elapsed().as_micros() as u64,
                "Prediction served"
            );
            Ok(Json(result.to_response()))
        }
        Err(e) => {
            state.metrics.record_failure();
            error!(%request_id, error = %e, "Error during prediction");
            Err(ApiError::bad_request(e.to_string()))
        }
    }
}

/// One-hot encoded feature columns, in model order
async fn features(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    match state.engine.features() {
        Ok(schema) => Ok(Json(json!({ "features": schema.columns() }))),
        Err(ServiceError::NotReady) => Err(ApiError::internal(
            "Training features are not available",
        )),
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}

/// Liveness; `status` is unconditional, readiness is reported alongside
async fn health_check(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "ready": state.engine.is_ready(),
        "version": state.engine.snapshot_version(),
    }))
}

/// Rebuild the schema and reload the model from disk
async fn reload(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.reload())
        .await
        .map_err(|e| ApiError::internal(format!("reload task failed: {e}")))?;

    match outcome {
        Ok(snapshot) => {
            state.metrics.record_reload(true);
            info!(version = snapshot.version, "Data and model reloaded successfully via /reload");
            Ok(Json(json!({ "status": "Reload successful" })))
        }
        Err(e) => {
            state.metrics.record_reload(false);
            error!(error = %e, "Error during reload");
            Err(ApiError::internal(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{build_router, ApiState};
    use crate::config::{ArtifactsConfig, ScoringConfig};
    use crate::engine::ChurnEngine;
    use crate::metrics::ServiceMetrics;
    use crate::types::customer::CustomerRecord;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tower::ServiceExt;

    const DATASET: &str = "\
customerID,gender,SeniorCitizen,tenure,Contract,PaymentMethod,TotalCharges,Churn
a,Female,0,1,Month-to-month,Electronic check,29.85,Yes
b,Male,1,40,Two year,Mailed check,1889.5,No
c,Male,0,75,One year,Mailed check,8000.0,No
";

    // logit = -2 + 1.5 (month-to-month) + 0.5 (electronic check)
    const MODEL: &str = r#"{
        "intercept": -2.0,
        "coefficients": {
            "Contract_Month-to-month": 1.5,
            "PaymentMethod_Electronic check": 0.5,
            "SeniorCitizen_1": 0.8
        }
    }"#;

    fn artifacts(dir: &Path) -> ArtifactsConfig {
        let data_file = dir.join("reference.csv");
        let model_path = dir.join("model.json");
        std::fs::write(&data_file, DATASET).unwrap();
        std::fs::write(&model_path, MODEL).unwrap();
        ArtifactsConfig {
            data_file,
            model_path,
            onnx_threads: 1,
        }
    }

    fn state(artifacts: ArtifactsConfig) -> ApiState {
        let engine = Arc::new(ChurnEngine::with_parts(artifacts, ScoringConfig::default()));
        ApiState::new(engine, Arc::new(ServiceMetrics::new()))
    }

    fn ready_router(dir: &Path) -> (Router, ApiState) {
        let state = state(artifacts(dir));
        state.engine.load().unwrap();
        (build_router(state.clone(), &[]), state)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn sample() -> Value {
        serde_json::to_value(CustomerRecord::sample()).unwrap()
    }

    #[tokio::test]
    async fn test_predict_churn() {
        let dir = tempfile::tempdir().unwrap();
        let (router, state) = ready_router(dir.path());

        let (status, body) = send(&router, post_json("/predict", &sample())).await;
        assert_eq!(status, StatusCode::OK);
        // sigmoid(0) = 0.5 raw, 0.5 * 2.43 capped at 1.0
        assert_eq!(body["prediction"], "This customer is likely to churn.");
        assert_eq!(body["confidence"], "100.0%");
        assert_eq!(body["threshold"], 0.3);
        assert_eq!(state.metrics.predictions.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_predict_continue_with_calibrated_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = ready_router(dir.path());

        let mut record = sample();
        record["Contract"] = json!("Two year");
        record["PaymentMethod"] = json!("Mailed check");
        let (status, body) = send(&router, post_json("/predict", &record)).await;

        // sigmoid(-2) = 0.1192; calibrated 0.28966
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"], "This customer is likely to continue");
        assert_eq!(body["confidence"], "28.97%");
    }

    #[tokio::test]
    async fn test_invalid_total_charges_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = ready_router(dir.path());

        let mut record = sample();
        record["TotalCharges"] = json!("abc");
        record["SeniorCitizen"] = json!(1);
        let (status, _) = send(&router, post_json("/predict", &record)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_tenure_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (router, state) = ready_router(dir.path());

        let mut record = sample();
        record["tenure"] = json!("a while");
        let (status, body) = send(&router, post_json("/predict", &record)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("tenure"));
        assert_eq!(state.metrics.failed_requests.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = ready_router(dir.path());

        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from("{ not json"))
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_features_lists_schema() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = ready_router(dir.path());

        let (status, body) = send(&router, get("/features")).await;
        assert_eq!(status, StatusCode::OK);
        let features: Vec<&str> = body["features"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(features.first(), Some(&"gender_Female"));
        assert!(features.contains(&"tenure_group_nan"));
        assert_eq!(features.last(), Some(&"tenure_group_nan"));
    }

    #[tokio::test]
    async fn test_unready_service() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(artifacts(dir.path()));
        let router = build_router(state, &[]);

        let (status, body) = send(&router, get("/features")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Training features are not available");

        let (status, _) = send(&router, post_json("/predict", &sample())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["ready"], false);
    }

    #[tokio::test]
    async fn test_reload_recovers_unready_service() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(artifacts(dir.path()));
        let router = build_router(state.clone(), &[]);

        let (status, body) = send(&router, post_json("/reload", &json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Reload successful");
        assert!(state.engine.is_ready());

        let (status, _) = send(&router, get("/features")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_failed_reload_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let (router, state) = ready_router(dir.path());
        std::fs::remove_file(dir.path().join("model.json")).unwrap();

        let (status, body) = send(&router, post_json("/reload", &json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("model"));
        // previous snapshot keeps serving
        assert_eq!(state.engine.snapshot_version(), Some(1));
        assert_eq!(state.metrics.failed_reloads.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_predict_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let (router, state) = ready_router(dir.path());

        let requests = (0..64).map(|i| {
            let router = router.clone();
            tokio::spawn(async move {
                let request = if i % 8 == 0 {
                    post_json("/reload", &json!({}))
                } else {
                    post_json("/predict", &sample())
                };
                (i % 8 == 0, send(&router, request).await)
            })
        });

        for outcome in futures::future::join_all(requests).await {
            let (is_reload, (status, body)) = outcome.unwrap();
            assert_eq!(status, StatusCode::OK);
            if !is_reload {
                assert_eq!(body["confidence"], "100.0%");
            }
        }
        assert_eq!(state.engine.snapshot_version(), Some(9));
    }
}
