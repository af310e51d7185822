//! Compatibility adapter for callers built against the old per-service
//! helpers.
//!
//! Bridges the per-IP/per-hash call style onto [`EnrichmentService`],
//! memoizing one enrichment per key so a caller asking for `dshield`,
//! `urlhaus`, and `spur` in sequence triggers a single session
//! enrichment.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use nectar_core::record::{EnrichmentRecord, SessionEnrichment, SpurFields, empty_dshield};
use nectar_middleware::CacheSnapshot;

use crate::core::EnrichmentService;

/// Bridge from the legacy per-service helpers to the façade.
pub struct LegacyAdapter {
    service: Arc<EnrichmentService>,
    sessions: Mutex<HashMap<String, SessionEnrichment>>,
    files: Mutex<HashMap<String, Option<Value>>>,
}

impl LegacyAdapter {
    /// Wrap a façade instance.
    #[must_use]
    pub fn new(service: Arc<EnrichmentService>) -> Self {
        Self {
            service,
            sessions: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Reputation metadata for an IP, empty sentinel on any failure.
    pub async fn dshield(&self, ip: &str) -> Value {
        self.session_enrichment(ip).await.dshield
    }

    /// Abuse-feed tag string for an IP.
    pub async fn urlhaus(&self, ip: &str) -> String {
        self.session_enrichment(ip).await.urlhaus
    }

    /// IP context in the fixed 18-field form.
    pub async fn spur(&self, ip: &str) -> SpurFields {
        self.session_enrichment(ip).await.spur
    }

    /// Scanner payload for a file hash, `None` on miss or failure.
    pub async fn virustotal(&self, file_hash: &str, filename: Option<&str>) -> Option<Value> {
        let mut files = self.files.lock().await;
        if let Some(cached) = files.get(file_hash) {
            return cached.clone();
        }
        let name = filename.unwrap_or(file_hash);
        let payload = match self.service.enrich_file(file_hash, name).await {
            Ok(EnrichmentRecord::File { enrichment, .. }) => enrichment.virustotal,
            _ => None,
        };
        files.insert(file_hash.to_string(), payload.clone());
        payload
    }

    /// Underlying cache telemetry.
    #[must_use]
    pub fn cache_snapshot(&self) -> CacheSnapshot {
        self.service.cache_snapshot()
    }

    async fn session_enrichment(&self, ip: &str) -> SessionEnrichment {
        let mut sessions = self.sessions.lock().await;
        if let Some(cached) = sessions.get(ip) {
            return cached.clone();
        }
        let enrichment = match self.service.enrich_session(ip, ip).await {
            Ok(EnrichmentRecord::Session { enrichment, .. }) => enrichment,
            _ => SessionEnrichment {
                dshield: empty_dshield(),
                urlhaus: String::new(),
                spur: SpurFields::empty(),
            },
        };
        sessions.insert(ip.to_string(), enrichment.clone());
        enrichment
    }
}
