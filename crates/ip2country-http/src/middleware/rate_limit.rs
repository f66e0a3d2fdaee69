//! Per-client rate-limiting middleware.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AppState;

/// Key used when no client address can be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Derives the rate-limit key for a request.
///
/// With `trust_proxy` set, the first `X-Forwarded-For` element wins, then
/// `X-Real-IP`; otherwise (or when both are absent) the peer address.
/// Addresses are normalized so `::ffff:a.b.c.d` and `a.b.c.d` share a key.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        if let Some(raw) = forwarded.or_else(real_ip) {
            return normalize(raw);
        }
    }

    peer.map_or_else(
        || UNKNOWN_CLIENT.to_string(),
        |addr| canonical(addr.ip()).to_string(),
    )
}

fn normalize(raw: &str) -> String {
    raw.parse::<IpAddr>()
        .map_or_else(|_| raw.to_string(), |ip| canonical(ip).to_string())
}

fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}

/// Rate-limiting middleware. Returns 429 when the client's window is full.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let key = client_key(req.headers(), peer, state.trust_proxy_headers());

    if !state.admit(&key) {
        tracing::debug!(client = %key, "rate limit exceeded");
        return Err(ApiError::TooManyRequests);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.10:5555".parse().unwrap())
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.5 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.1"),
        ]);
        assert_eq!(client_key(&h, peer(), true), "203.0.113.5");
    }

    #[test]
    fn real_ip_when_no_forwarded_for() {
        let h = headers(&[("x-real-ip", "::ffff:198.51.100.1")]);
        assert_eq!(client_key(&h, peer(), true), "198.51.100.1");
    }

    #[test]
    fn peer_address_fallback() {
        assert_eq!(client_key(&HeaderMap::new(), peer(), true), "192.0.2.10");
        assert_eq!(client_key(&HeaderMap::new(), None, true), UNKNOWN_CLIENT);
    }

    #[test]
    fn proxy_headers_ignored_when_untrusted() {
        let h = headers(&[("x-forwarded-for", "203.0.113.5")]);
        assert_eq!(client_key(&h, peer(), false), "192.0.2.10");
    }

    #[test]
    fn unparsable_header_used_verbatim() {
        let h = headers(&[("x-forwarded-for", "proxy-host")]);
        assert_eq!(client_key(&h, peer(), true), "proxy-host");
    }
}
