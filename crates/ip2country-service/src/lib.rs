//! ip2country Service — core business logic for the ip2country server.
//!
//! This crate contains all transport-agnostic logic: the location store
//! and its longest-prefix-match resolver, database loading, the per-client
//! sliding-window rate limiter, and metrics.
//!
//! The transport crate (`ip2country-http`) depends on this crate and
//! provides the HTTP adapter.

pub mod database;
pub mod error;
pub mod location;
pub mod metrics;
pub mod rate_limit;
pub mod store;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use database::LocationDatabase;
use error::{LoadError, NotFoundError};
use location::Location;
use metrics::Metrics;
use rate_limit::{RateLimitConfig, RateLimiter};

/// Configuration subset relevant to the service layer.
///
/// Transport-specific config (bind address, log format) stays in the
/// binary crate's `Config` struct.
pub struct ServiceConfig {
    pub rate_limit_rps: u32,
    pub database_type: String,
    pub database_path: PathBuf,
}

/// Shared service state, cloneable across all request handlers.
#[derive(Clone)]
pub struct ServiceState {
    inner: Arc<Inner>,
}

struct Inner {
    database: Arc<dyn LocationDatabase>,
    rate_limiter: RateLimiter,
    metrics: Metrics,
    start_time: Instant,
}

impl ServiceState {
    /// Loads the configured database and starts the rate limiter.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &ServiceConfig) -> Result<Self, LoadError> {
        let database = database::open_database(&config.database_type, &config.database_path)?;
        let rate_limiter = RateLimiter::new(RateLimitConfig::per_second(config.rate_limit_rps));
        Ok(Self::from_parts(database, rate_limiter))
    }

    /// Assembles a state from an already-built database and limiter.
    pub fn from_parts(database: Arc<dyn LocationDatabase>, rate_limiter: RateLimiter) -> Self {
        Self {
            inner: Arc::new(Inner {
                database,
                rate_limiter,
                metrics: Metrics::new(),
                start_time: Instant::now(),
            }),
        }
    }

    // --- Accessors ---

    pub fn database(&self) -> &dyn LocationDatabase {
        self.inner.database.as_ref()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    // --- Operations ---

    /// Admission check for one client key.
    pub fn admit(&self, client_key: &str) -> bool {
        let allowed = self.inner.rate_limiter.allow(client_key);
        if !allowed {
            self.inner.metrics.record_rate_limited();
        }
        allowed
    }

    /// Resolves an address, recording the outcome.
    pub fn lookup(&self, addr: IpAddr) -> Result<Arc<Location>, NotFoundError> {
        let result = self.inner.database.find_location(addr);
        self.inner.metrics.record_lookup(result.is_ok());
        result
    }

    /// Renders service metrics in Prometheus text format.
    pub fn render_metrics(&self) -> String {
        self.inner.metrics.render(
            self.inner.database.entry_count(),
            self.inner.rate_limiter.tracked_keys(),
            self.uptime_secs(),
        )
    }

    // --- Maintenance ---

    /// Stops background tasks. Call once at shutdown.
    pub fn shutdown(&self) {
        self.inner.rate_limiter.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::LocationStore;

    fn state(rate: u32) -> ServiceState {
        let store = LocationStore::build([
            ["203.0.113.0/24", "Paris", "FR"],
            ["198.51.100.7", "Austin", "US"],
        ])
        .unwrap();
        ServiceState::from_parts(
            Arc::new(store),
            RateLimiter::new(RateLimitConfig::per_second(rate)),
        )
    }

    #[tokio::test]
    async fn lookup_records_metrics() {
        let s = state(10);
        assert_eq!(s.lookup("203.0.113.42".parse().unwrap()).unwrap().city, "Paris");
        assert!(s.lookup("8.8.8.8".parse().unwrap()).is_err());
        assert_eq!(s.metrics().lookups_total(), 2);
        assert!(s.render_metrics().contains("ip2country_lookups_not_found_total 1\n"));
    }

    #[tokio::test]
    async fn admit_counts_rejections() {
        let s = state(1);
        assert!(s.admit("client"));
        assert!(!s.admit("client"));
        assert_eq!(s.metrics().rate_limited_total(), 1);

        s.shutdown();
        assert!(s.rate_limiter().is_stopped());
    }
}
