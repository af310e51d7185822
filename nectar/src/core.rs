//! The enrichment façade.
//!
//! One [`EnrichmentService`] instance serves many concurrent callers.
//! Within a single lookup the per-service order is fixed: cache lookup,
//! quota check (file scanner only), token acquisition, HTTP exchange
//! through the retry wrapper, parse, sanitize, cache write-through.
//! Concurrent calls for the same `(service, key)` are not serialized;
//! the loser of a benign race overwrites with the same sanitized
//! payload.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use nectar_core::record::{
    EnrichmentRecord, FileEnrichment, SessionEnrichment, SpurFields, empty_dshield,
};
use nectar_core::sanitize::{sanitize_filename, sanitize_json_tree};
use nectar_core::{CancelToken, SessionFlags, session_flags};
use nectar_middleware::{
    CacheSnapshot, DurableStore, DurableTier, FilesystemTier, MemoryTier, QuotaApi, QuotaManager,
    RateLimiterMap, RedisStore, RetryPolicy, TieredCache,
};
use nectar_providers::adapter::{DshieldApi, HttpApi, SpurApi, UrlhausApi, VirustotalApi};
use nectar_providers::{dshield, spur, urlhaus, virustotal};
use nectar_types::{Credentials, EnrichmentConfig, NectarError, Service};

use crate::telemetry::EnrichmentTelemetry;

/// Coordinates external enrichment lookups with shared caching.
pub struct EnrichmentService {
    cfg: EnrichmentConfig,
    creds: Credentials,
    cache: TieredCache,
    limiters: RateLimiterMap,
    retry: RetryPolicy,
    dshield_retry: RetryPolicy,
    quota: Option<QuotaManager>,
    telemetry: Option<EnrichmentTelemetry>,
    dshield_api: Arc<dyn DshieldApi>,
    urlhaus_api: Arc<dyn UrlhausApi>,
    spur_api: Arc<dyn SpurApi>,
    virustotal_api: Arc<dyn VirustotalApi>,
    cancel: CancelToken,
    closed: AtomicBool,
}

impl EnrichmentService {
    /// Start building a service.
    #[must_use]
    pub fn builder(cfg: EnrichmentConfig, creds: Credentials) -> EnrichmentServiceBuilder {
        EnrichmentServiceBuilder::new(cfg, creds)
    }

    fn ensure_open(&self) -> Result<(), NectarError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NectarError::Closed);
        }
        Ok(())
    }

    /// Enrich a session/IP pair.
    ///
    /// Each provider is consulted independently; a failure in one falls
    /// back to that provider's empty sentinel without affecting the
    /// others.
    ///
    /// # Errors
    /// Only programmer errors surface: calling after [`close`](Self::close)
    /// yields `NectarError::Closed`. Provider, network, and cache faults
    /// collapse into sentinels.
    pub async fn enrich_session(
        &self,
        session_id: &str,
        src_ip: &str,
    ) -> Result<EnrichmentRecord, NectarError> {
        self.ensure_open()?;
        let started = Instant::now();

        let enrichment = if self.cfg.skip_enrich {
            SessionEnrichment::empty()
        } else {
            SessionEnrichment {
                dshield: self.dshield_lookup(src_ip).await,
                urlhaus: self.urlhaus_lookup(src_ip).await,
                spur: self.spur_lookup(src_ip).await,
            }
        };

        if let Some(telemetry) = &self.telemetry {
            telemetry.record_session_enrichment(true);
            telemetry.record_cache_stats(self.cache.snapshot());
            telemetry.add_enrichment_duration(started.elapsed());
        }

        Ok(EnrichmentRecord::Session {
            session_id: session_id.to_string(),
            src_ip: src_ip.to_string(),
            enrichment,
        })
    }

    /// Enrich a file hash with scanner results.
    ///
    /// The filesystem tier is probed by hash before anything else;
    /// scanner payloads are large and a disk hit avoids churning the
    /// in-memory tiers.
    ///
    /// # Errors
    /// Only `NectarError::Closed` after [`close`](Self::close); all
    /// provider faults collapse into `virustotal: None`.
    pub async fn enrich_file(
        &self,
        file_hash: &str,
        filename: &str,
    ) -> Result<EnrichmentRecord, NectarError> {
        self.ensure_open()?;
        let started = Instant::now();
        let filename = sanitize_filename(filename);

        if self.cfg.skip_enrich || self.creds.for_service(Service::Virustotal).is_none() {
            if let Some(telemetry) = &self.telemetry {
                telemetry.record_file_enrichment(false);
            }
            return Ok(EnrichmentRecord::File {
                file_hash: file_hash.to_string(),
                filename,
                enrichment: FileEnrichment { virustotal: None },
            });
        }

        let mut payload = self
            .cache
            .filesystem_get(Service::Virustotal, file_hash)
            .await
            .map(|value| sanitize_json_tree(&value));
        if payload.is_none() {
            payload = self.virustotal_fetch(file_hash).await;
        }

        if let Some(telemetry) = &self.telemetry {
            telemetry.record_file_enrichment(payload.is_some());
            telemetry.record_cache_stats(self.cache.snapshot());
            telemetry.add_enrichment_duration(started.elapsed());
        }

        Ok(EnrichmentRecord::File {
            file_hash: file_hash.to_string(),
            filename,
            enrichment: FileEnrichment { virustotal: payload },
        })
    }

    /// Derive the boolean flags for a record.
    #[must_use]
    pub fn session_flags(&self, record: &EnrichmentRecord) -> SessionFlags {
        session_flags(record)
    }

    /// Cache counters across tiers.
    #[must_use]
    pub fn cache_snapshot(&self) -> CacheSnapshot {
        self.cache.snapshot()
    }

    /// Telemetry counter summary, when telemetry is enabled.
    #[must_use]
    pub fn telemetry_summary(&self) -> Option<Value> {
        self.telemetry.as_ref().map(EnrichmentTelemetry::summary)
    }

    /// File-scanner quota status, when quota management is enabled.
    pub async fn quota_status(&self) -> Value {
        match &self.quota {
            Some(quota) => quota.status().await,
            None => serde_json::json!({
                "status": "disabled",
                "message": "quota management not enabled",
            }),
        }
    }

    /// The cancellation token observed by in-flight sleeps.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Close the service. Idempotent; subsequent enrichment calls fail
    /// fast with `NectarError::Closed`. Pending calls finish best
    /// effort: the cancellation token unblocks their sleeps.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        if let Some(quota) = &self.quota {
            quota.close().await;
        }
        self.virustotal_api.close().await;
        self.cache.close().await;
    }

    // ------------------------------------------------------------------
    // Per-service lookups
    // ------------------------------------------------------------------

    async fn dshield_lookup(&self, ip: &str) -> Value {
        if self.creds.for_service(Service::Dshield).is_none() {
            return empty_dshield();
        }
        let api = Arc::clone(&self.dshield_api);
        let target = ip.to_string();
        let call = async {
            self.acquire_token(Service::Dshield).await?;
            let raw = self
                .dshield_retry
                .run("dshield", Some(&self.cancel), move || {
                    let api = Arc::clone(&api);
                    let target = target.clone();
                    async move { api.ip_report(&target).await }
                })
                .await?;
            Ok(dshield::shape_report(raw))
        };
        match self.cached_fetch(Service::Dshield, ip, call).await {
            Some(value) if value.is_object() => value,
            _ => empty_dshield(),
        }
    }

    async fn urlhaus_lookup(&self, ip: &str) -> String {
        if self.creds.for_service(Service::Urlhaus).is_none() {
            return String::new();
        }
        let api = Arc::clone(&self.urlhaus_api);
        let target = ip.to_string();
        let call = async {
            self.acquire_token(Service::Urlhaus).await?;
            let raw = self
                .retry
                .run("urlhaus", Some(&self.cancel), move || {
                    let api = Arc::clone(&api);
                    let target = target.clone();
                    async move { api.host_report(&target).await }
                })
                .await?;
            Ok(Value::String(urlhaus::extract_tags(&raw)))
        };
        // Scoped deadline around the whole call, retries included; the
        // expiry sentinel is distinct from "no tags".
        let lookup = self.cached_fetch(Service::Urlhaus, ip, call);
        match tokio::time::timeout(self.cfg.urlhaus_deadline, lookup).await {
            Ok(Some(Value::String(tags))) => tags,
            Ok(_) => String::new(),
            Err(_) => {
                warn!(target: "nectar::provider", ip, "urlhaus deadline expired");
                urlhaus::TIMEOUT_SENTINEL.to_string()
            }
        }
    }

    async fn spur_lookup(&self, ip: &str) -> SpurFields {
        if self.creds.for_service(Service::Spur).is_none() {
            return SpurFields::empty();
        }
        let api = Arc::clone(&self.spur_api);
        let target = ip.to_string();
        let call = async {
            self.acquire_token(Service::Spur).await?;
            let raw = self
                .retry
                .run("spur", Some(&self.cancel), move || {
                    let api = Arc::clone(&api);
                    let target = target.clone();
                    async move { api.ip_context(&target).await }
                })
                .await?;
            let fields = spur::flatten_context(&raw);
            Ok(serde_json::to_value(&fields).unwrap_or_else(|_| Value::Array(Vec::new())))
        };
        match self.cached_fetch(Service::Spur, ip, call).await {
            Some(value) => spur::from_cached(&value),
            None => SpurFields::empty(),
        }
    }

    async fn virustotal_fetch(&self, file_hash: &str) -> Option<Value> {
        if let Some(quota) = &self.quota
            && !quota.can_call(self.cfg.vt_quota_threshold_percent).await
        {
            let backoff = quota.backoff_for_now().await;
            warn!(
                target: "nectar::provider",
                file_hash,
                backoff_secs = backoff.as_secs(),
                "scanner quota threshold exceeded, skipping call"
            );
            return None;
        }
        if self.acquire_token(Service::Virustotal).await.is_err() {
            return None;
        }
        let api = Arc::clone(&self.virustotal_api);
        let target = file_hash.to_string();
        let result = self
            .retry
            .run("virustotal", Some(&self.cancel), move || {
                let api = Arc::clone(&api);
                let target = target.clone();
                async move { api.file_report(&target).await }
            })
            .await;
        match result {
            Ok(Some(raw)) => {
                let Some(normalized) = virustotal::normalize_report(raw) else {
                    warn!(target: "nectar::provider", file_hash, "scanner payload had no usable shape");
                    self.record_api_call(Service::Virustotal, false);
                    return None;
                };
                let sanitized = sanitize_json_tree(&normalized);
                self.cache.put(Service::Virustotal, file_hash, &sanitized).await;
                self.record_api_call(Service::Virustotal, true);
                Some(sanitized)
            }
            Ok(None) => {
                // The scanner has never seen the file; a successful call.
                self.record_api_call(Service::Virustotal, true);
                None
            }
            Err(err) => {
                warn!(target: "nectar::provider", file_hash, %err, "scanner enrichment failed");
                self.record_api_call(Service::Virustotal, false);
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    /// Cache-or-call helper for the IP services: consult the composed
    /// cache, fall back to the API call, sanitize, write through.
    async fn cached_fetch<F>(&self, service: Service, key: &str, call: F) -> Option<Value>
    where
        F: Future<Output = Result<Value, NectarError>>,
    {
        if let Some(hit) = self.cache.get(service, key).await {
            // Entries written before sanitization was introduced may
            // still carry control characters.
            return Some(sanitize_json_tree(&hit));
        }
        match call.await {
            Ok(raw) => {
                let sanitized = sanitize_json_tree(&raw);
                self.cache.put(service, key, &sanitized).await;
                self.record_api_call(service, true);
                debug!(target: "nectar::facade", %service, key, "api call, sanitization, and cache store");
                Some(sanitized)
            }
            Err(err) => {
                warn!(target: "nectar::facade", %service, key, %err, "enrichment call failed");
                self.record_api_call(service, false);
                None
            }
        }
    }

    async fn acquire_token(&self, service: Service) -> Result<(), NectarError> {
        let waited = self.limiters.acquire(service, &self.cancel).await?;
        if let Some(telemetry) = &self.telemetry {
            telemetry.record_rate_limit_wait(waited);
        }
        Ok(())
    }

    fn record_api_call(&self, service: Service, success: bool) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.record_api_call(service, success);
        }
    }
}

/// Builder for [`EnrichmentService`].
///
/// Adapters default to the reqwest-backed [`HttpApi`]; tests inject
/// their own implementations per trait.
pub struct EnrichmentServiceBuilder {
    cfg: EnrichmentConfig,
    creds: Credentials,
    dshield_api: Option<Arc<dyn DshieldApi>>,
    urlhaus_api: Option<Arc<dyn UrlhausApi>>,
    spur_api: Option<Arc<dyn SpurApi>>,
    virustotal_api: Option<Arc<dyn VirustotalApi>>,
    quota_api: Option<Arc<dyn QuotaApi>>,
    durable_store: Option<Arc<dyn DurableStore>>,
    cancel: Option<CancelToken>,
    memory_capacity: u64,
}

impl EnrichmentServiceBuilder {
    /// Start from configuration and credentials.
    #[must_use]
    pub fn new(cfg: EnrichmentConfig, creds: Credentials) -> Self {
        Self {
            cfg,
            creds,
            dshield_api: None,
            urlhaus_api: None,
            spur_api: None,
            virustotal_api: None,
            quota_api: None,
            durable_store: None,
            cancel: None,
            memory_capacity: MemoryTier::DEFAULT_CAPACITY,
        }
    }

    /// Inject a reputation adapter.
    #[must_use]
    pub fn with_dshield_api(mut self, api: Arc<dyn DshieldApi>) -> Self {
        self.dshield_api = Some(api);
        self
    }

    /// Inject an abuse-feed adapter.
    #[must_use]
    pub fn with_urlhaus_api(mut self, api: Arc<dyn UrlhausApi>) -> Self {
        self.urlhaus_api = Some(api);
        self
    }

    /// Inject an IP-context adapter.
    #[must_use]
    pub fn with_spur_api(mut self, api: Arc<dyn SpurApi>) -> Self {
        self.spur_api = Some(api);
        self
    }

    /// Inject a file-scanner adapter.
    #[must_use]
    pub fn with_virustotal_api(mut self, api: Arc<dyn VirustotalApi>) -> Self {
        self.virustotal_api = Some(api);
        self
    }

    /// Inject a quota endpoint client.
    #[must_use]
    pub fn with_quota_api(mut self, api: Arc<dyn QuotaApi>) -> Self {
        self.quota_api = Some(api);
        self
    }

    /// Inject a durable backing store instead of connecting by URL.
    #[must_use]
    pub fn with_durable_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.durable_store = Some(store);
        self
    }

    /// Observe an externally owned cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Override the per-service in-memory capacity.
    #[must_use]
    pub const fn with_memory_capacity(mut self, capacity: u64) -> Self {
        self.memory_capacity = capacity;
        self
    }

    /// Assemble the service.
    ///
    /// A durable-cache URL that fails to connect composes the tier out
    /// with a warning rather than failing the build; cache faults never
    /// block enrichment.
    ///
    /// # Errors
    /// Currently infallible in practice; the signature leaves room for
    /// configuration validation.
    pub async fn build(self) -> Result<EnrichmentService, NectarError> {
        let http = Arc::new(HttpApi::new(self.creds.clone(), self.cfg.http_timeout));

        let durable = if self.cfg.enable_durable_cache {
            if let Some(store) = self.durable_store {
                Some(DurableTier::new(store, self.cfg.ttls.clone()))
            } else if let Some(url) = &self.cfg.durable_url {
                match RedisStore::connect(url).await {
                    Ok(store) => Some(DurableTier::new(Arc::new(store), self.cfg.ttls.clone())),
                    Err(err) => {
                        warn!(target: "nectar::cache", %err, "durable cache unavailable, composing tier out");
                        None
                    }
                }
            } else {
                None
            }
        } else {
            None
        };

        let mut cache = TieredCache::builder()
            .with_memory(MemoryTier::new(&self.cfg.ttls, self.memory_capacity))
            .with_filesystem(FilesystemTier::new(
                self.cfg.cache_base.clone(),
                self.cfg.ttls.clone(),
            ));
        if let Some(tier) = durable {
            cache = cache.with_durable(tier);
        }
        let cache = cache.build();

        let quota = if self.cfg.enable_vt_quota
            && self.creds.for_service(Service::Virustotal).is_some()
            && !self.cfg.skip_enrich
        {
            let api = self.quota_api.unwrap_or_else(|| http.clone() as Arc<dyn QuotaApi>);
            Some(QuotaManager::new(api, self.cfg.quota_refresh_ttl))
        } else {
            None
        };

        let telemetry = self.cfg.enable_telemetry.then(EnrichmentTelemetry::new);
        let limiters = RateLimiterMap::new(&self.cfg.rate_limits, self.cfg.enable_rate_limiting);
        let retry = RetryPolicy::from_config(&self.cfg.retry, false);
        let dshield_retry = RetryPolicy::from_config(&self.cfg.retry, true);

        Ok(EnrichmentService {
            creds: self.creds,
            cache,
            limiters,
            retry,
            dshield_retry,
            quota,
            telemetry,
            dshield_api: self
                .dshield_api
                .unwrap_or_else(|| http.clone() as Arc<dyn DshieldApi>),
            urlhaus_api: self
                .urlhaus_api
                .unwrap_or_else(|| http.clone() as Arc<dyn UrlhausApi>),
            spur_api: self
                .spur_api
                .unwrap_or_else(|| http.clone() as Arc<dyn SpurApi>),
            virustotal_api: self
                .virustotal_api
                .unwrap_or_else(|| http.clone() as Arc<dyn VirustotalApi>),
            cancel: self.cancel.unwrap_or_default(),
            closed: AtomicBool::new(false),
            cfg: self.cfg,
        })
    }
}
