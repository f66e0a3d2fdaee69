//! Per-key sliding-window rate limiting.
//!
//! Transport-agnostic core. The HTTP crate extracts a client key from each
//! request and calls [`RateLimiter::allow`].
//!
//! Every key keeps the timestamps of its admitted requests inside the
//! trailing window `(now - window, now]`. A request is admitted while fewer
//! than `rate` timestamps remain after pruning. Rejected requests are not
//! recorded. A background sweeper drops keys that have been idle for the
//! whole retention horizon.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Idle keys are kept for this many windows before the sweeper drops them.
const RETENTION_WINDOWS: u32 = 5;

/// Limiter policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per key within one window.
    pub rate: u32,
    /// Length of the sliding window.
    pub window: Duration,
    /// Period between eviction sweeps.
    pub sweep_interval: Duration,
    /// Keys with no admitted request newer than this are evicted.
    pub retention: Duration,
}

impl RateLimitConfig {
    /// `rate` requests per second, swept every second, idle keys kept 5s.
    pub fn per_second(rate: u32) -> Self {
        let window = Duration::from_secs(1);
        Self {
            rate,
            window,
            sweep_interval: window,
            retention: window * RETENTION_WINDOWS,
        }
    }
}

/// In-memory per-key sliding-window rate limiter.
///
/// Cloning is cheap and every clone shares the same state. Each decision
/// holds the key's map shard exclusively across prune-decide-record, so two
/// concurrent calls for one key can never both take the last slot.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
    shutdown: CancellationToken,
}

struct RateLimiterInner {
    rate: usize,
    window: Duration,
    retention: Duration,
    requests: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter and starts its eviction sweeper.
    ///
    /// Must be called from within a Tokio runtime. A `rate` of zero rejects
    /// every request.
    pub fn new(config: RateLimitConfig) -> Self {
        let inner = Arc::new(RateLimiterInner {
            rate: config.rate as usize,
            window: config.window,
            retention: config.retention,
            requests: DashMap::new(),
        });
        let shutdown = CancellationToken::new();

        spawn_sweeper(
            Arc::downgrade(&inner),
            config.sweep_interval,
            shutdown.clone(),
        );

        tracing::debug!(
            rate = config.rate,
            window_ms = config.window.as_millis() as u64,
            retention_ms = config.retention.as_millis() as u64,
            "Rate limiter started",
        );

        Self { inner, shutdown }
    }

    /// Returns `true` if the request is admitted, `false` if rate-limited.
    pub fn allow(&self, key: &str) -> bool {
        let mut timestamps = self.inner.requests.entry(key.to_owned()).or_default();
        // Read the clock under the shard lock so timestamps stay ordered.
        self.inner.admit(&mut timestamps, Instant::now())
    }

    /// Same decision as [`allow`](Self::allow), evaluated at `now`.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut timestamps = self.inner.requests.entry(key.to_owned()).or_default();
        self.inner.admit(&mut timestamps, now)
    }

    /// Evicts keys idle for the whole retention horizon as of `now`.
    ///
    /// Returns the number of keys removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        self.inner.sweep(now)
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.inner.requests.len()
    }

    /// Stops the background sweeper. Idempotent.
    ///
    /// The limiter must not be used for admission after this.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            self.shutdown.cancel();
            tracing::debug!("Rate limiter stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl RateLimiterInner {
    fn admit(&self, timestamps: &mut VecDeque<Instant>, now: Instant) -> bool {
        // Half-open window: a timestamp exactly at the cutoff is expired.
        if let Some(cutoff) = now.checked_sub(self.window) {
            timestamps.retain(|t| *t > cutoff);
        }

        if timestamps.len() >= self.rate {
            return false;
        }

        timestamps.push_back(now);
        true
    }

    fn sweep(&self, now: Instant) -> usize {
        let Some(horizon) = now.checked_sub(self.retention) else {
            return 0;
        };

        let mut removed = 0;
        self.requests.retain(|_, timestamps| {
            let keep = timestamps.iter().any(|t| *t > horizon);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

/// Runs sweeps every `period` until cancelled or the limiter is dropped.
fn spawn_sweeper(inner: Weak<RateLimiterInner>, period: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,
                _ = tick.tick() => {
                    let Some(inner) = inner.upgrade() else {
                        break;
                    };
                    let removed = inner.sweep(Instant::now());
                    if removed > 0 {
                        tracing::debug!(
                            removed,
                            remaining = inner.requests.len(),
                            "Evicted idle rate-limit keys",
                        );
                    }
                }
            }
        }

        tracing::debug!("Rate limiter sweeper exited");
    });
}
