//! ip2country HTTP — REST API transport adapter for the ip2country server.
//!
//! Provides:
//! - `GET /v1/find-country?ip=<addr>` (rate-limited per client)
//! - `GET /health`, `GET /metrics`
//! - `GET /api/openapi.json`
//! - Request-ID, request-timeout and rate-limiting middleware

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use error::ErrorBody;
use types::{HealthResponse, LocationResponse};

pub use state::AppState;

// ---------------------------------------------------------------------------
// OpenAPI
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ip2country API",
        description = "Resolves IPv4 and IPv6 addresses to country and city.\n\nExact address entries take precedence over network ranges; among ranges the longest matching prefix wins. Lookups are rate-limited per client.",
        license(name = "Apache-2.0"),
    ),
    paths(routes::lookup::find_country, routes::system::health),
    components(schemas(LocationResponse, HealthResponse, ErrorBody)),
    tags(
        (name = "Lookup", description = "Address to location resolution"),
        (name = "System", description = "System and health endpoints"),
    )
)]
pub(crate) struct ApiDoc;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Builds the HTTP API router.
///
/// Only the `/v1` lookup routes are rate-limited; health and metrics
/// endpoints are never throttled. The limiter wraps the GET handler alone, so
/// a request with the wrong method is answered with 405 before it can use
/// up the client's quota.
pub fn router(state: AppState) -> Router {
    let find_country = get(routes::lookup::find_country)
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ))
        .fallback(routes::method_not_allowed);

    let v1 = Router::new().route("/find-country", find_country);

    Router::new()
        .nest("/v1", v1)
        .route(
            "/health",
            get(routes::system::health).fallback(routes::method_not_allowed),
        )
        .route(
            "/metrics",
            get(routes::system::metrics_endpoint).fallback(routes::method_not_allowed),
        )
        .route(
            "/api/openapi.json",
            get(routes::system::openapi).fallback(routes::method_not_allowed),
        )
        .fallback(routes::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::timeout::timeout_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            middleware::request_id::request_id_middleware,
        ))
        .with_state(state)
}

/// Serve the router on the given listener with graceful shutdown.
///
/// Wraps `axum::serve` with `ConnectInfo<SocketAddr>` so the rate limiter
/// can fall back to the peer address.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
