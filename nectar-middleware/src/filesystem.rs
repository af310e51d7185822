//! Filesystem cache tier.
//!
//! Layout is deterministic so the out-of-band cleanup job can
//! enumerate it: `{base}/{service}/{shard}/{digest}.json`, where the
//! digest is the hex SHA-256 of the key and the shard is its first two
//! hex characters. Each file holds the sanitized payload verbatim; the
//! file's mtime is authoritative for TTL. Directories are created
//! lazily on first write.

use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use nectar_types::{Service, TtlConfig};

use crate::cache::{CacheTier, TierCounters, TierStats};

/// Outcome of one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Entries examined.
    pub scanned: u64,
    /// Stale entries unlinked.
    pub deleted: u64,
    /// I/O failures during the sweep.
    pub errors: u64,
}

/// On-disk cache tier.
pub struct FilesystemTier {
    base: PathBuf,
    ttls: TtlConfig,
    counters: TierCounters,
}

fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

impl FilesystemTier {
    /// Create a tier rooted at `base`. The directory itself is created
    /// lazily on first write.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>, ttls: TtlConfig) -> Self {
        Self {
            base: base.into(),
            ttls,
            counters: TierCounters::default(),
        }
    }

    /// Root directory of the tier.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn entry_path(&self, service: Service, key: &str) -> PathBuf {
        let digest = key_digest(key);
        self.base
            .join(service.as_str())
            .join(&digest[..2])
            .join(format!("{digest}.json"))
    }

    /// Read one entry, enforcing TTL by mtime. Stale entries read as a
    /// miss and are unlinked in passing.
    async fn read_entry(&self, service: Service, path: &Path) -> Option<Value> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        let mtime = metadata.modified().ok()?;
        let age = SystemTime::now().duration_since(mtime).unwrap_or_default();
        if age > self.ttls.ttl_for(service) {
            debug!(
                target: "nectar::cache",
                %service,
                path = %path.display(),
                "stale filesystem entry, deleting"
            );
            let _ = tokio::fs::remove_file(path).await;
            return None;
        }
        let text = tokio::fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(
                    target: "nectar::cache",
                    %service,
                    path = %path.display(),
                    %err,
                    "malformed filesystem entry ignored"
                );
                None
            }
        }
    }

    /// IP-prefix fallback for the IP-context service.
    ///
    /// Digested filenames preclude a glob, so on an exact miss the /24
    /// neighbors of an IPv4 key are probed directly. The heuristic stays
    /// inside this tier; callers only ever see a plain hit or miss.
    async fn spur_prefix_fallback(&self, key: &str) -> Option<Value> {
        let (prefix, last) = key.rsplit_once('.')?;
        // Only IPv4 dotted-quad keys participate.
        last.parse::<u8>().ok()?;
        for candidate_octet in 0u16..=255 {
            let candidate = format!("{prefix}.{candidate_octet}");
            if candidate == key {
                continue;
            }
            let path = self.entry_path(Service::Spur, &candidate);
            if let Some(value) = self.read_entry(Service::Spur, &path).await {
                debug!(
                    target: "nectar::cache",
                    key,
                    candidate,
                    "spur prefix fallback hit"
                );
                return Some(value);
            }
        }
        None
    }

    /// Sweep the tier, unlinking entries older than their service TTL.
    ///
    /// Safe to run while the cache is serving: a racing reader simply
    /// misses on its next read. Schedule at most one cleanup job per
    /// base directory.
    pub async fn cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for service in Service::ALL {
            let ttl = self.ttls.ttl_for(service);
            let service_dir = self.base.join(service.as_str());
            let Ok(mut shards) = tokio::fs::read_dir(&service_dir).await else {
                continue;
            };
            while let Ok(Some(shard)) = shards.next_entry().await {
                let Ok(mut entries) = tokio::fs::read_dir(shard.path()).await else {
                    report.errors += 1;
                    continue;
                };
                while let Ok(Some(entry)) = entries.next_entry().await {
                    report.scanned += 1;
                    let stale = match entry.metadata().await.and_then(|m| m.modified()) {
                        Ok(mtime) => {
                            SystemTime::now().duration_since(mtime).unwrap_or_default() > ttl
                        }
                        Err(_) => {
                            report.errors += 1;
                            continue;
                        }
                    };
                    if stale {
                        match tokio::fs::remove_file(entry.path()).await {
                            Ok(()) => report.deleted += 1,
                            Err(_) => report.errors += 1,
                        }
                    }
                }
            }
        }
        report
    }
}

#[async_trait]
impl CacheTier for FilesystemTier {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn get(&self, service: Service, key: &str) -> Option<Value> {
        let started = Instant::now();
        let path = self.entry_path(service, key);
        if let Some(value) = self.read_entry(service, &path).await {
            self.counters.hit(started);
            return Some(value);
        }
        if service == Service::Spur
            && let Some(value) = self.spur_prefix_fallback(key).await
        {
            self.counters.hit(started);
            return Some(value);
        }
        self.counters.miss(started);
        None
    }

    async fn put(&self, service: Service, key: &str, payload: &Value) {
        let started = Instant::now();
        let path = self.entry_path(service, key);
        let Some(parent) = path.parent() else {
            self.counters.error();
            return;
        };
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            debug!(target: "nectar::cache", %service, %err, "cache dir creation failed");
            self.counters.error();
            return;
        }
        let text = serde_json::to_string(payload).unwrap_or_default();
        match tokio::fs::write(&path, text).await {
            Ok(()) => self.counters.store(started),
            Err(err) => {
                debug!(
                    target: "nectar::cache",
                    %service,
                    path = %path.display(),
                    %err,
                    "cache write failed"
                );
                self.counters.error();
            }
        }
    }

    async fn delete(&self, service: Service, key: &str) {
        let path = self.entry_path(service, key);
        let _ = tokio::fs::remove_file(path).await;
    }

    fn stats(&self) -> TierStats {
        self.counters.snapshot()
    }
}
