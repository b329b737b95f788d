//! Per-key admission control.
//!
//! Each key (typically a session id) owns a token bucket that holds up to
//! `burst` tokens and refills continuously at `rps` tokens per second.
//! Buckets are created on first use and dropped by an idle sweep.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Buckets unused for this long are reclaimed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// How often the background sweeper runs.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Limiter settings shared by every bucket.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub rps: f64,
    pub burst: u32,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            rps: 2.0,
            burst: 5,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Snapshot returned by [`RateLimiter::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimiterStats {
    /// Number of live buckets.
    pub count: usize,
    pub rps: f64,
    pub burst: u32,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_used: Instant,
}

impl Bucket {
    fn full(burst: u32, now: Instant) -> Self {
        Self {
            tokens: f64::from(burst),
            last_refill: now,
            last_used: now,
        }
    }

    fn refill(&mut self, now: Instant, rps: f64, burst: u32) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = elapsed.mul_add(rps, self.tokens).min(f64::from(burst));
        self.last_refill = now;
    }
}

/// Keyed token-bucket limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    /// Creates a limiter. `rps` must be positive and finite; `burst` is at least 1.
    pub fn new(mut config: RateLimiterConfig) -> Result<Self> {
        if !config.rps.is_finite() || config.rps <= 0.0 {
            return Err(Error::Config(format!(
                "rate limit rps must be positive, got {}",
                config.rps
            )));
        }
        config.burst = config.burst.max(1);

        Ok(Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        })
    }

    pub const fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a token if one is available, otherwise returns how long until one is.
    fn reserve(&self, key: &str) -> std::result::Result<(), Duration> {
        let now = Instant::now();
        let RateLimiterConfig { rps, burst, .. } = self.config;

        let mut buckets = self.lock();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::full(burst, now));

        bucket.refill(now, rps, burst);
        bucket.last_used = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - bucket.tokens) / rps))
        }
    }

    /// Consumes one token for `key`, or returns `false` when the bucket is empty.
    pub fn allow(&self, key: &str) -> bool {
        self.reserve(key).is_ok()
    }

    /// Like [`RateLimiter::allow`], reporting denial as [`Error::RateLimited`].
    pub fn try_acquire(&self, key: &str) -> Result<()> {
        self.reserve(key).map_err(|_| Error::RateLimited {
            key: key.to_string(),
        })
    }

    /// Waits until a token for `key` is available.
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires first.
    pub async fn wait(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let delay = match self.reserve(key) {
                Ok(()) => return Ok(()),
                Err(delay) => delay,
            };

            tracing::trace!(key, delay_ms = delay.as_millis() as u64, "rate limited, waiting");

            tokio::select! {
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Drops the bucket for `key`; the next call starts with a full bucket.
    pub fn reset(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            count: self.lock().len(),
            rps: self.config.rps,
            burst: self.config.burst,
        }
    }

    /// Removes buckets idle longer than the configured timeout. Returns the number removed.
    pub fn sweep_idle(&self) -> usize {
        let now = Instant::now();
        let idle = self.config.idle_timeout;

        let mut buckets = self.lock();
        let before = buckets.len();
        buckets.retain(|_, b| now.saturating_duration_since(b.last_used) <= idle);
        let removed = before - buckets.len();

        if removed > 0 {
            tracing::debug!(removed, remaining = buckets.len(), "swept idle rate limiters");
        }
        removed
    }

    /// Runs [`RateLimiter::sweep_idle`] periodically until `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        let period = limiter.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        limiter.sweep_idle();
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn limiter(rps: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            rps,
            burst,
            ..RateLimiterConfig::default()
        })
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_deny_then_refill() {
        let limiter = limiter(2.0, 3);

        for _ in 0..3 {
            assert!(limiter.allow("s1"));
        }
        assert!(!limiter.allow("s1"));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.allow("s1"));
        assert!(!limiter.allow("s1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = limiter(1.0, 1);
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_reports_key() {
        let limiter = limiter(1.0, 1);
        limiter.try_acquire("s1").unwrap();
        let err = limiter.try_acquire("s1").unwrap_err();
        assert!(matches!(err, Error::RateLimited { ref key } if key == "s1"));
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_until_token() {
        let limiter = limiter(4.0, 1);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        limiter.wait("s1", &cancel).await.unwrap();
        limiter.wait("s1", &cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_cancelled() {
        let limiter = limiter(0.001, 1);
        let cancel = CancellationToken::new();
        limiter.wait("s1", &cancel).await.unwrap();

        cancel.cancel();
        assert!(matches!(
            limiter.wait("s1", &cancel).await,
            Err(Error::Cancelled)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_refills() {
        let limiter = limiter(0.001, 1);
        assert!(limiter.allow("s1"));
        assert!(!limiter.allow("s1"));
        limiter.reset("s1");
        assert!(limiter.allow("s1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_idle_buckets() {
        let limiter = limiter(1.0, 1);
        limiter.allow("old");
        tokio::time::advance(Duration::from_secs(30 * 60)).await;
        limiter.allow("fresh");
        tokio::time::advance(Duration::from_secs(31 * 60)).await;

        assert_eq!(limiter.sweep_idle(), 1);
        let stats = limiter.stats();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.burst, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_stops_on_cancel() {
        let limiter = Arc::new(limiter(1.0, 1));
        limiter.allow("idle");

        let cancel = CancellationToken::new();
        let handle = limiter.spawn_sweeper(cancel.clone());

        tokio::time::sleep(Duration::from_secs(71 * 60)).await;
        assert_eq!(limiter.stats().count, 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn test_rejects_non_positive_rps() {
        assert!(
            RateLimiter::new(RateLimiterConfig {
                rps: 0.0,
                ..RateLimiterConfig::default()
            })
            .is_err()
        );
    }
}
