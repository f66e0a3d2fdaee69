//! HTTP error mapping.
//!
//! Every error status carries a JSON body `{"error": "<message>"}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ip2country_service::error::NotFoundError;
use serde::Serialize;
use utoipa::ToSchema;

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed request input.
    #[error("{0}")]
    BadRequest(String),

    /// The address matched no database entry.
    #[error("IP address not found")]
    NotFound(#[from] NotFoundError),

    /// The client exceeded its request rate.
    #[error("rate limit exceeded")]
    TooManyRequests,

    /// The path exists but not for this method.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// No route matches the path.
    #[error("not found")]
    RouteNotFound,

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
        };

        let body = ErrorBody {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
