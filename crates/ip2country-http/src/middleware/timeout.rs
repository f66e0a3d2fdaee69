//! Per-request deadline.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AppState;

/// Fails the request with 408 if the inner service does not finish within
/// the configured timeout.
pub async fn timeout_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let limit = state.request_timeout();
    if limit.is_zero() {
        return Ok(next.run(req).await);
    }

    tokio::time::timeout(limit, next.run(req))
        .await
        .map_err(|_| {
            tracing::warn!("request timed out after {limit:?}");
            ApiError::Timeout
        })
}
