//! The composed cache hierarchy.
//!
//! Three tiers share one contract: an in-memory store for hot keys, a
//! durable shared store, and a filesystem directory. Reads fall through
//! L1 → L2 → L3; a hit on a lower tier is promoted opportunistically.
//! Writes fan out to every present tier, and a tier that fails a write
//! never fails the request. Tiers are independent and may disagree;
//! there is no containment invariant between them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use nectar_types::{Service, TtlConfig};

use crate::durable::DurableTier;
use crate::filesystem::FilesystemTier;

/// Counter snapshot for one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    /// Reads that found a fresh entry.
    pub hits: u64,
    /// Reads that found nothing usable.
    pub misses: u64,
    /// Successful writes.
    pub stores: u64,
    /// I/O failures, reads and writes combined.
    pub errors: u64,
    /// Mean operation latency in milliseconds.
    pub avg_latency_ms: f64,
}

/// Shared atomic counters maintained by each tier.
#[derive(Debug, Default)]
pub struct TierCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    errors: AtomicU64,
    latency_us: AtomicU64,
}

impl TierCounters {
    pub(crate) fn hit(&self, started: Instant) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.track(started);
    }

    pub(crate) fn miss(&self, started: Instant) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.track(started);
    }

    pub(crate) fn store(&self, started: Instant) {
        self.stores.fetch_add(1, Ordering::Relaxed);
        self.track(started);
    }

    pub(crate) fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn track(&self, started: Instant) {
        let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.latency_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TierStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let stores = self.stores.load(Ordering::Relaxed);
        let ops = hits + misses + stores;
        let avg_latency_ms = if ops == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                self.latency_us.load(Ordering::Relaxed) as f64 / ops as f64 / 1000.0
            }
        };
        TierStats {
            hits,
            misses,
            stores,
            errors: self.errors.load(Ordering::Relaxed),
            avg_latency_ms,
        }
    }
}

/// Contract shared by every cache tier.
///
/// Tier faults never surface: a failed read is a miss, a failed write is
/// dropped, and both are counted as errors.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Short tier name for logs and telemetry.
    fn name(&self) -> &'static str;

    /// Look up the payload cached for `(service, key)`.
    async fn get(&self, service: Service, key: &str) -> Option<Value>;

    /// Store a sanitized payload for `(service, key)`.
    async fn put(&self, service: Service, key: &str, payload: &Value);

    /// Drop any entry for `(service, key)`.
    async fn delete(&self, service: Service, key: &str);

    /// Counter snapshot.
    fn stats(&self) -> TierStats;
}

/// In-memory tier: one TTL-bounded store per service.
pub struct MemoryTier {
    stores: HashMap<Service, Cache<String, Arc<Value>>>,
    counters: TierCounters,
}

impl MemoryTier {
    /// Default per-service entry capacity.
    pub const DEFAULT_CAPACITY: u64 = 4096;

    /// Build one store per service with that service's TTL.
    #[must_use]
    pub fn new(ttls: &TtlConfig, capacity_per_service: u64) -> Self {
        let stores = Service::ALL
            .iter()
            .map(|&service| {
                let cache = Cache::builder()
                    .max_capacity(capacity_per_service.max(1))
                    .time_to_live(ttls.ttl_for(service))
                    .build();
                (service, cache)
            })
            .collect();
        Self {
            stores,
            counters: TierCounters::default(),
        }
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, service: Service, key: &str) -> Option<Value> {
        let started = Instant::now();
        let Some(store) = self.stores.get(&service) else {
            self.counters.miss(started);
            return None;
        };
        match store.get(key).await {
            Some(value) => {
                self.counters.hit(started);
                Some((*value).clone())
            }
            None => {
                self.counters.miss(started);
                None
            }
        }
    }

    async fn put(&self, service: Service, key: &str, payload: &Value) {
        let started = Instant::now();
        if let Some(store) = self.stores.get(&service) {
            store.insert(key.to_string(), Arc::new(payload.clone())).await;
            self.counters.store(started);
        }
    }

    async fn delete(&self, service: Service, key: &str) {
        if let Some(store) = self.stores.get(&service) {
            store.invalidate(key).await;
        }
    }

    fn stats(&self) -> TierStats {
        self.counters.snapshot()
    }
}

/// Per-tier and aggregate counter snapshot of the composed cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// In-memory tier stats, when the tier is present.
    pub memory: Option<TierStats>,
    /// Durable tier stats, when the tier is present.
    pub durable: Option<TierStats>,
    /// Filesystem tier stats, when the tier is present.
    pub filesystem: Option<TierStats>,
}

impl CacheSnapshot {
    fn tiers(&self) -> impl Iterator<Item = &TierStats> {
        [
            self.memory.as_ref(),
            self.durable.as_ref(),
            self.filesystem.as_ref(),
        ]
        .into_iter()
        .flatten()
    }

    /// Hits summed across tiers.
    #[must_use]
    pub fn total_hits(&self) -> u64 {
        self.tiers().map(|t| t.hits).sum()
    }

    /// Misses summed across tiers.
    #[must_use]
    pub fn total_misses(&self) -> u64 {
        self.tiers().map(|t| t.misses).sum()
    }

    /// Stores summed across tiers.
    #[must_use]
    pub fn total_stores(&self) -> u64 {
        self.tiers().map(|t| t.stores).sum()
    }

    /// Errors summed across tiers.
    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.tiers().map(|t| t.errors).sum()
    }
}

/// The composed three-level cache.
///
/// Any subset of tiers may be present; absent tiers compose out of both
/// the read path and the write fan-out.
#[derive(Default)]
pub struct TieredCache {
    memory: Option<MemoryTier>,
    durable: Option<DurableTier>,
    filesystem: Option<FilesystemTier>,
}

impl TieredCache {
    /// Start composing a cache.
    #[must_use]
    pub fn builder() -> TieredCacheBuilder {
        TieredCacheBuilder::default()
    }

    /// Read through the hierarchy, promoting lower-tier hits.
    pub async fn get(&self, service: Service, key: &str) -> Option<Value> {
        if let Some(memory) = &self.memory
            && let Some(value) = memory.get(service, key).await
        {
            debug!(target: "nectar::cache", %service, tier = "memory", event = "hit", "cache hit");
            return Some(value);
        }
        if let Some(durable) = &self.durable
            && let Some(value) = durable.get(service, key).await
        {
            debug!(target: "nectar::cache", %service, tier = "durable", event = "hit", "cache hit");
            if let Some(memory) = &self.memory {
                memory.put(service, key, &value).await;
            }
            return Some(value);
        }
        if let Some(filesystem) = &self.filesystem
            && let Some(value) = filesystem.get(service, key).await
        {
            debug!(target: "nectar::cache", %service, tier = "filesystem", event = "hit", "cache hit");
            if let Some(durable) = &self.durable {
                durable.put(service, key, &value).await;
            }
            if let Some(memory) = &self.memory {
                memory.put(service, key, &value).await;
            }
            return Some(value);
        }
        None
    }

    /// Write through to every present tier.
    pub async fn put(&self, service: Service, key: &str, payload: &Value) {
        if let Some(memory) = &self.memory {
            memory.put(service, key, payload).await;
        }
        if let Some(durable) = &self.durable {
            durable.put(service, key, payload).await;
        }
        if let Some(filesystem) = &self.filesystem {
            filesystem.put(service, key, payload).await;
        }
    }

    /// Delete from every present tier.
    pub async fn delete(&self, service: Service, key: &str) {
        if let Some(memory) = &self.memory {
            memory.delete(service, key).await;
        }
        if let Some(durable) = &self.durable {
            durable.delete(service, key).await;
        }
        if let Some(filesystem) = &self.filesystem {
            filesystem.delete(service, key).await;
        }
    }

    /// Probe the filesystem tier directly, bypassing the upper tiers.
    ///
    /// File-scan payloads are large; a disk hit avoids churning the
    /// in-memory stores.
    pub async fn filesystem_get(&self, service: Service, key: &str) -> Option<Value> {
        self.filesystem.as_ref()?.get(service, key).await
    }

    /// The filesystem tier, when present.
    #[must_use]
    pub const fn filesystem(&self) -> Option<&FilesystemTier> {
        self.filesystem.as_ref()
    }

    /// Counter snapshot across tiers.
    #[must_use]
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            memory: self.memory.as_ref().map(CacheTier::stats),
            durable: self.durable.as_ref().map(CacheTier::stats),
            filesystem: self.filesystem.as_ref().map(CacheTier::stats),
        }
    }

    /// Release the durable tier's connection.
    pub async fn close(&self) {
        if let Some(durable) = &self.durable {
            durable.close().await;
        }
    }
}

/// Builder assembling the tier composition.
#[derive(Default)]
pub struct TieredCacheBuilder {
    memory: Option<MemoryTier>,
    durable: Option<DurableTier>,
    filesystem: Option<FilesystemTier>,
}

impl TieredCacheBuilder {
    /// Attach the in-memory tier.
    #[must_use]
    pub fn with_memory(mut self, tier: MemoryTier) -> Self {
        self.memory = Some(tier);
        self
    }

    /// Attach the durable shared tier.
    #[must_use]
    pub fn with_durable(mut self, tier: DurableTier) -> Self {
        self.durable = Some(tier);
        self
    }

    /// Attach the filesystem tier.
    #[must_use]
    pub fn with_filesystem(mut self, tier: FilesystemTier) -> Self {
        self.filesystem = Some(tier);
        self
    }

    /// Finish the composition.
    #[must_use]
    pub fn build(self) -> TieredCache {
        TieredCache {
            memory: self.memory,
            durable: self.durable,
            filesystem: self.filesystem,
        }
    }
}
