//! HTTP surface of the prediction service.
//!
//! `POST /predict`, `GET /features`, `GET /health` and `POST /reload`.
//! Errors are returned as `{ "detail": "<text>" }`.

pub mod handlers;

use crate::engine::ChurnEngine;
use crate::metrics::ServiceMetrics;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state accessible by all handlers
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<ChurnEngine>,
    pub metrics: Arc<ServiceMetrics>,
}

impl ApiState {
    /// Shared handler state
    pub fn new(engine: Arc<ChurnEngine>, metrics: Arc<ServiceMetrics>) -> Self {
        Self { engine, metrics }
    }
}

/// Error response carrying a status code and a text detail
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    /// Error response with a status and detail
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// 400 with a detail message
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    /// 500 with a detail message
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

/// Build the router with all routes.
///
/// An empty origin list allows any origin, method and header.
pub fn build_router(state: ApiState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    handlers::routes()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
