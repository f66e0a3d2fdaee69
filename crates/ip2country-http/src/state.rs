//! HTTP application state: wraps `ServiceState` with HTTP-specific fields.
//!
//! `AppState` provides transparent access to all `ServiceState` methods
//! via `Deref`.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use ip2country_service::ServiceState;

/// Shared HTTP application state, cloneable across handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

struct AppInner {
    service: ServiceState,
    trust_proxy_headers: bool,
    request_timeout: Duration,
}

impl Deref for AppState {
    type Target = ServiceState;

    fn deref(&self) -> &ServiceState {
        &self.inner.service
    }
}

impl AppState {
    /// Creates a new HTTP application state.
    ///
    /// With `trust_proxy_headers`, the rate limiter keys clients by
    /// `X-Forwarded-For` / `X-Real-IP` before the socket address. A
    /// `request_timeout` of zero disables the per-request deadline.
    pub fn new(
        service: ServiceState,
        trust_proxy_headers: bool,
        request_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(AppInner {
                service,
                trust_proxy_headers,
                request_timeout,
            }),
        }
    }

    pub fn trust_proxy_headers(&self) -> bool {
        self.inner.trust_proxy_headers
    }

    /// Deadline for a whole request (`Duration::ZERO` means disabled).
    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    /// Returns a reference to the underlying service state.
    pub fn service(&self) -> &ServiceState {
        &self.inner.service
    }
}
