//! System endpoints: health, metrics and the OpenAPI document.

use axum::extract::{Json, State};
use axum::http::header;
use axum::response::IntoResponse;
use utoipa::OpenApi;

use crate::ApiDoc;
use crate::state::AppState;
use crate::types::HealthResponse;

/// Check server health.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse),
    ),
    tag = "System"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_secs(),
        database_entries: state.database().entry_count(),
    })
}

/// Prometheus text exposition.
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.render_metrics(),
    )
}

pub async fn openapi() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
