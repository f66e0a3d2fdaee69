//! Lightweight Prometheus-compatible metrics using atomic counters.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Service-wide counters.
pub struct Metrics {
    lookups_total: AtomicU64,
    lookups_not_found_total: AtomicU64,
    rate_limited_total: AtomicU64,
    invalid_requests_total: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            lookups_total: AtomicU64::new(0),
            lookups_not_found_total: AtomicU64::new(0),
            rate_limited_total: AtomicU64::new(0),
            invalid_requests_total: AtomicU64::new(0),
        }
    }

    /// Record a lookup and whether it found a location.
    pub fn record_lookup(&self, found: bool) {
        self.lookups_total.fetch_add(1, Ordering::Relaxed);
        if !found {
            self.lookups_not_found_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a request rejected by the rate limiter.
    pub fn record_rate_limited(&self) {
        self.rate_limited_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request rejected for a missing or malformed address.
    pub fn record_invalid_request(&self) {
        self.invalid_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lookups_total(&self) -> u64 {
        self.lookups_total.load(Ordering::Relaxed)
    }

    pub fn rate_limited_total(&self) -> u64 {
        self.rate_limited_total.load(Ordering::Relaxed)
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self, database_entries: usize, tracked_keys: usize, uptime_seconds: u64) -> String {
        let mut out = String::with_capacity(1024);

        gauge(
            &mut out,
            "ip2country_database_entries",
            "Entries loaded into the location database",
            database_entries,
        );
        gauge(
            &mut out,
            "ip2country_rate_limit_tracked_keys",
            "Client keys currently held by the rate limiter",
            tracked_keys,
        );
        gauge(
            &mut out,
            "ip2country_uptime_seconds",
            "Server uptime in seconds",
            uptime_seconds,
        );

        counter(
            &mut out,
            "ip2country_lookups_total",
            "Address lookups performed",
            self.lookups_total.load(Ordering::Relaxed),
        );
        counter(
            &mut out,
            "ip2country_lookups_not_found_total",
            "Lookups that matched no entry",
            self.lookups_not_found_total.load(Ordering::Relaxed),
        );
        counter(
            &mut out,
            "ip2country_rate_limited_total",
            "Requests rejected by the rate limiter",
            self.rate_limited_total.load(Ordering::Relaxed),
        );
        counter(
            &mut out,
            "ip2country_invalid_requests_total",
            "Requests with a missing or malformed address",
            self.invalid_requests_total.load(Ordering::Relaxed),
        );

        out
    }
}

// Writing to a String cannot fail.
fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}");
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render() {
        let m = Metrics::new();
        m.record_lookup(true);
        m.record_lookup(false);
        m.record_rate_limited();

        let text = m.render(3, 1, 42);
        assert!(text.contains("ip2country_lookups_total 2\n"));
        assert!(text.contains("ip2country_lookups_not_found_total 1\n"));
        assert!(text.contains("ip2country_rate_limited_total 1\n"));
        assert!(text.contains("ip2country_invalid_requests_total 0\n"));
        assert!(text.contains("ip2country_database_entries 3\n"));
        assert!(text.contains("# TYPE ip2country_lookups_total counter\n"));
    }
}
