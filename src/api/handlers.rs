use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::collections::HashMap;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::{ApiResponse, HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<ApiResponse<RootResponse>> {
    let api = state.settings().api();
    let response = RootResponse {
        message: api.project_name.clone(),
        version: api.version.clone(),
        api_prefix: api.api_prefix.clone(),
    };

    Json(ApiResponse::ok(response))
}

pub(crate) async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();

    let status = match repositories::health::ping(state.db()).await {
        Ok(()) => {
            components.insert("database".to_string(), "healthy".to_string());
            "healthy"
        }
        Err(err) => {
            tracing::warn!(error = %err, "Health check database ping failed");
            components.insert("database".to_string(), "unhealthy".to_string());
            "unhealthy"
        }
    };

    let code =
        if status == "healthy" { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = HealthResponse {
        service: "quizbank-api".to_string(),
        status: status.to_string(),
        components,
    };

    let envelope = ApiResponse {
        success: code == StatusCode::OK,
        message: status.to_string(),
        data: Some(body),
    };
    (code, Json(envelope))
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
