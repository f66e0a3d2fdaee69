//! Request and response types for the HTTP API.

use ip2country_service::location::Location;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query string of `GET /v1/find-country`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FindCountryQuery {
    /// IPv4 or IPv6 address to resolve.
    pub ip: Option<String>,
}

impl FindCountryQuery {
    /// Builds the query from decoded key/value pairs. The first `ip` wins
    /// when the parameter is repeated; unknown keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let ip = pairs
            .into_iter()
            .find_map(|(key, value)| (key == "ip").then_some(value));
        Self { ip }
    }
}

/// Location owning the queried address.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LocationResponse {
    pub country: String,
    pub city: String,
}

impl From<&Location> for LocationResponse {
    fn from(location: &Location) -> Self {
        Self {
            country: location.country.clone(),
            city: location.city.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub database_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn first_ip_parameter_wins() {
        let q = FindCountryQuery::from_pairs(pairs(&[
            ("format", "json"),
            ("ip", "203.0.113.1"),
            ("ip", "8.8.8.8"),
        ]));
        assert_eq!(q.ip.as_deref(), Some("203.0.113.1"));
    }

    #[test]
    fn absent_ip_parameter() {
        assert_eq!(FindCountryQuery::from_pairs(pairs(&[("x", "1")])).ip, None);
    }
}
