//! Address lookup endpoint.

use std::net::IpAddr;

use axum::extract::{Json, Query, State};

use crate::error::{ApiError, ErrorBody};
use crate::state::AppState;
use crate::types::{FindCountryQuery, LocationResponse};

/// Resolve an IP address to its country and city.
///
/// Exact address entries take precedence; otherwise the most specific
/// network containing the address is used.
#[utoipa::path(
    get,
    path = "/v1/find-country",
    params(FindCountryQuery),
    responses(
        (status = 200, description = "Location found", body = LocationResponse),
        (status = 400, description = "Missing or malformed address", body = ErrorBody),
        (status = 404, description = "Address not in database", body = ErrorBody),
        (status = 408, description = "Request timed out", body = ErrorBody),
        (status = 429, description = "Rate limit exceeded", body = ErrorBody),
    ),
    tag = "Lookup"
)]
pub async fn find_country(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<LocationResponse>, ApiError> {
    let params = FindCountryQuery::from_pairs(pairs);
    let addr = parse_ip(params.ip.as_deref()).inspect_err(|_| {
        state.metrics().record_invalid_request();
    })?;

    let location = state.lookup(addr)?;
    Ok(Json(LocationResponse::from(location.as_ref())))
}

fn parse_ip(raw: Option<&str>) -> Result<IpAddr, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing 'ip' query parameter".to_string()))?;

    raw.parse()
        .map_err(|_| ApiError::BadRequest("invalid IP address format".to_string()))
}
