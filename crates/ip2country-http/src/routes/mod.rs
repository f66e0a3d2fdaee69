//! HTTP API route handlers.

pub mod lookup;
pub mod system;

use crate::error::ApiError;

/// Method fallback for every route: a JSON 405 that never reaches the
/// route's middleware.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Router fallback for unknown paths.
pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}
