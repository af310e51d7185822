//! Quota manager for the file-scanning provider.
//!
//! The provider exposes usage and limit endpoints; a snapshot is cached
//! for a short TTL and refreshed behind an async mutex so only one task
//! fetches at a time. When the snapshot cannot be fetched at all the
//! manager defaults to allowing calls, leaving the rate limiter and the
//! retry wrapper as the safety net.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use nectar_types::{NectarError, QuotaSnapshot};

/// Seam to the provider's quota endpoints.
#[async_trait]
pub trait QuotaApi: Send + Sync {
    /// Fetch current usage and limits.
    async fn fetch_snapshot(&self) -> Result<QuotaSnapshot, NectarError>;

    /// Release any held resources.
    async fn close(&self) {}
}

struct Cached {
    snapshot: QuotaSnapshot,
    fetched_at: Instant,
}

/// TTL-cached view of the file scanner's quota state.
pub struct QuotaManager {
    api: Arc<dyn QuotaApi>,
    refresh_ttl: Duration,
    state: Mutex<Option<Cached>>,
}

impl QuotaManager {
    /// Create a manager refreshing through `api` at most once per
    /// `refresh_ttl`.
    #[must_use]
    pub fn new(api: Arc<dyn QuotaApi>, refresh_ttl: Duration) -> Self {
        Self {
            api,
            refresh_ttl,
            state: Mutex::new(None),
        }
    }

    /// Current snapshot, refreshed when stale. A failed refresh falls
    /// back to the stale snapshot when one exists.
    pub async fn snapshot(&self) -> Option<QuotaSnapshot> {
        let mut state = self.state.lock().await;
        if let Some(cached) = state.as_ref()
            && cached.fetched_at.elapsed() < self.refresh_ttl
        {
            return Some(cached.snapshot.clone());
        }
        match self.api.fetch_snapshot().await {
            Ok(snapshot) => {
                debug!(
                    target: "nectar::quota",
                    daily_percent = snapshot.daily_usage_percent(),
                    hourly_percent = snapshot.hourly_usage_percent(),
                    "refreshed quota snapshot"
                );
                *state = Some(Cached {
                    snapshot: snapshot.clone(),
                    fetched_at: Instant::now(),
                });
                Some(snapshot)
            }
            Err(err) => {
                warn!(target: "nectar::quota", %err, "quota refresh failed");
                state.as_ref().map(|cached| cached.snapshot.clone())
            }
        }
    }

    /// Drop the cached snapshot so the next query refreshes.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        *state = None;
    }

    /// Whether a call fits under `threshold_percent`.
    ///
    /// Both daily and hourly usage must sit strictly below the
    /// threshold; an unavailable snapshot allows the call.
    pub async fn can_call(&self, threshold_percent: f64) -> bool {
        match self.snapshot().await {
            None => true,
            Some(snapshot) => {
                snapshot.daily_usage_percent() < threshold_percent
                    && snapshot.hourly_usage_percent() < threshold_percent
            }
        }
    }

    /// Recommended backoff before the next attempt, scaled by usage.
    pub async fn backoff_for_now(&self) -> Duration {
        let secs = match self.snapshot().await {
            None => 60,
            Some(snapshot) => {
                let peak = snapshot.peak_usage_percent();
                if peak >= 95.0 {
                    3600
                } else if peak >= 90.0 {
                    1800
                } else if peak >= 80.0 {
                    900
                } else {
                    60
                }
            }
        };
        Duration::from_secs(secs)
    }

    /// Human-oriented status summary: `healthy` below 90 % usage,
    /// `warning` from 90 %, `critical` from 95 %, `unknown` when no
    /// snapshot could be fetched.
    pub async fn status(&self) -> Value {
        let Some(snapshot) = self.snapshot().await else {
            return json!({
                "status": "unknown",
                "message": "unable to fetch quota information",
            });
        };
        let peak = snapshot.peak_usage_percent();
        let status = if peak >= 95.0 {
            "critical"
        } else if peak >= 90.0 {
            "warning"
        } else {
            "healthy"
        };
        json!({
            "status": status,
            "daily": {
                "used": snapshot.daily_used,
                "limit": snapshot.daily_limit,
                "remaining": snapshot.daily_remaining(),
                "usage_percent": snapshot.daily_usage_percent(),
            },
            "hourly": {
                "used": snapshot.hourly_used,
                "limit": snapshot.hourly_limit,
                "remaining": snapshot.hourly_remaining(),
                "usage_percent": snapshot.hourly_usage_percent(),
            },
            "observed_at": snapshot.observed_at.to_rfc3339(),
        })
    }

    /// Close the underlying quota client.
    pub async fn close(&self) {
        self.api.close().await;
    }
}
