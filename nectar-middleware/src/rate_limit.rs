//! Per-service token buckets.
//!
//! Burst semantics are token-bucket, not sliding-window: tokens refill
//! continuously at the configured rate up to the burst cap, and each
//! acquisition consumes exactly one. A caller that finds the bucket dry
//! sleeps in place until its reservation is covered, so upstream APIs
//! are never stampeded.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use nectar_core::CancelToken;
use nectar_types::{NectarError, RateLimitOverrides, Service};

use crate::retry::sleep_or_cancel;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket configured by `(rate_per_second, burst)`.
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket starting at full burst capacity.
    #[must_use]
    pub fn new(rate_per_second: f64, burst: u32) -> Self {
        let rate = if rate_per_second > 0.0 {
            rate_per_second
        } else {
            1.0
        };
        let burst = f64::from(burst.max(1));
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token out of the bucket, or reserve one and compute how
    /// long the caller must wait for it. Reservations may drive the
    /// balance negative, which keeps concurrent waiters ordered.
    fn reserve(&self) -> Duration {
        let mut state = self.state.lock().expect("mutex poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.last_refill = now;
        state.tokens -= 1.0;
        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / self.rate)
        }
    }

    /// Acquire a token, sleeping in place when the bucket is dry.
    ///
    /// Returns the time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let wait = self.reserve();
        if !wait.is_zero() {
            debug!(
                target: "nectar::rate",
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "bucket dry, sleeping"
            );
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Like [`acquire`](Self::acquire), but unblocks promptly when the
    /// cancellation token trips.
    ///
    /// # Errors
    /// Returns `NectarError::Cancelled` when the token trips mid-wait.
    pub async fn acquire_with(&self, cancel: &CancelToken) -> Result<Duration, NectarError> {
        let wait = self.reserve();
        if !wait.is_zero() {
            sleep_or_cancel(wait, Some(cancel)).await?;
        }
        Ok(wait)
    }
}

/// One token bucket per upstream service.
pub struct RateLimiterMap {
    buckets: HashMap<Service, TokenBucket>,
    enabled: bool,
}

impl RateLimiterMap {
    /// Build buckets for every service from the baseline limits plus
    /// any overrides. A disabled map hands out tokens for free.
    #[must_use]
    pub fn new(overrides: &RateLimitOverrides, enabled: bool) -> Self {
        let buckets = Service::ALL
            .iter()
            .map(|&service| {
                let cfg = overrides.limit_for(service);
                (service, TokenBucket::new(cfg.rate_per_second, cfg.burst))
            })
            .collect();
        Self { buckets, enabled }
    }

    /// Acquire a token for `service`, waiting when necessary.
    ///
    /// Returns the time spent waiting.
    ///
    /// # Errors
    /// Returns `NectarError::Cancelled` when the token trips mid-wait.
    pub async fn acquire(
        &self,
        service: Service,
        cancel: &CancelToken,
    ) -> Result<Duration, NectarError> {
        if !self.enabled {
            return Ok(Duration::ZERO);
        }
        match self.buckets.get(&service) {
            Some(bucket) => bucket.acquire_with(cancel).await,
            None => Ok(Duration::ZERO),
        }
    }
}
