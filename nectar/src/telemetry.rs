//! Telemetry counters for the enrichment façade.
//!
//! All counters are atomics so concurrent callers update them without
//! coordination; the cache snapshot is replaced wholesale under a mutex
//! because it arrives as a composed struct.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};

use nectar_middleware::CacheSnapshot;
use nectar_types::Service;

/// Aggregated counters for one façade instance.
#[derive(Debug, Default)]
pub struct EnrichmentTelemetry {
    api_calls_total: AtomicU64,
    api_calls_successful: AtomicU64,
    api_calls_failed: AtomicU64,

    dshield_calls: AtomicU64,
    urlhaus_calls: AtomicU64,
    spur_calls: AtomicU64,
    virustotal_calls: AtomicU64,

    sessions_enriched: AtomicU64,
    files_enriched: AtomicU64,
    enrichment_errors: AtomicU64,

    rate_limit_hits: AtomicU64,
    rate_limit_wait_ms: AtomicU64,

    enrichment_duration_ms: AtomicU64,

    cache_stats: Mutex<CacheSnapshot>,
}

impl EnrichmentTelemetry {
    /// Fresh, all-zero counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one provider call and its outcome.
    pub fn record_api_call(&self, service: Service, success: bool) {
        self.api_calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.api_calls_successful.fetch_add(1, Ordering::Relaxed);
        } else {
            self.api_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        let per_service = match service {
            Service::Dshield => &self.dshield_calls,
            Service::Urlhaus => &self.urlhaus_calls,
            Service::Spur => &self.spur_calls,
            Service::Virustotal => &self.virustotal_calls,
        };
        per_service.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time spent blocked on a token bucket.
    pub fn record_rate_limit_wait(&self, waited: Duration) {
        if waited.is_zero() {
            return;
        }
        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
        self.rate_limit_wait_ms.fetch_add(
            u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
    }

    /// Record a completed session enrichment.
    pub fn record_session_enrichment(&self, success: bool) {
        if success {
            self.sessions_enriched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.enrichment_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a completed file enrichment.
    pub fn record_file_enrichment(&self, success: bool) {
        if success {
            self.files_enriched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.enrichment_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record total wall time spent inside an enrichment call.
    pub fn add_enrichment_duration(&self, elapsed: Duration) {
        self.enrichment_duration_ms.fetch_add(
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
    }

    /// Replace the cache tier snapshot.
    pub fn record_cache_stats(&self, snapshot: CacheSnapshot) {
        *self.cache_stats.lock().expect("mutex poisoned") = snapshot;
    }

    /// Cache hit rate across tiers, percent.
    #[must_use]
    pub fn cache_hit_rate(&self) -> f64 {
        let stats = self.cache_stats.lock().expect("mutex poisoned");
        let hits = stats.total_hits();
        let total = hits + stats.total_misses();
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            hits as f64 / total as f64 * 100.0
        }
    }

    /// Provider success rate, percent.
    #[must_use]
    pub fn api_success_rate(&self) -> f64 {
        let total = self.api_calls_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.api_calls_successful.load(Ordering::Relaxed) as f64 / total as f64 * 100.0
        }
    }

    /// Counter snapshot as JSON for status reporting.
    #[must_use]
    pub fn summary(&self) -> Value {
        let cache = self
            .cache_stats
            .lock()
            .expect("mutex poisoned")
            .clone();
        json!({
            "cache_stats": {
                "hits": cache.total_hits(),
                "misses": cache.total_misses(),
                "stores": cache.total_stores(),
                "errors": cache.total_errors(),
                "hit_rate_percent": self.cache_hit_rate(),
                "tiers": cache,
            },
            "api_stats": {
                "total_calls": self.api_calls_total.load(Ordering::Relaxed),
                "successful_calls": self.api_calls_successful.load(Ordering::Relaxed),
                "failed_calls": self.api_calls_failed.load(Ordering::Relaxed),
                "success_rate_percent": self.api_success_rate(),
            },
            "service_stats": {
                "dshield_calls": self.dshield_calls.load(Ordering::Relaxed),
                "urlhaus_calls": self.urlhaus_calls.load(Ordering::Relaxed),
                "spur_calls": self.spur_calls.load(Ordering::Relaxed),
                "virustotal_calls": self.virustotal_calls.load(Ordering::Relaxed),
            },
            "performance": {
                "sessions_enriched": self.sessions_enriched.load(Ordering::Relaxed),
                "files_enriched": self.files_enriched.load(Ordering::Relaxed),
                "enrichment_duration_ms": self.enrichment_duration_ms.load(Ordering::Relaxed),
            },
            "rate_limiting": {
                "rate_limit_hits": self.rate_limit_hits.load(Ordering::Relaxed),
                "total_wait_ms": self.rate_limit_wait_ms.load(Ordering::Relaxed),
            },
            "errors": {
                "enrichment_errors": self.enrichment_errors.load(Ordering::Relaxed),
            },
        })
    }
}
