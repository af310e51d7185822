//! Configuration types shared across the façade and middleware.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::service::Service;

/// Credentials for the upstream providers.
///
/// Any absent credential disables its provider: the façade returns the
/// service's empty sentinel without side effects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Registered email identifying the client to the reputation service.
    pub dshield_email: Option<String>,
    /// Auth key for the URL/host abuse feed.
    pub urlhaus_key: Option<String>,
    /// Token for the IP-context service.
    pub spur_token: Option<String>,
    /// API key for the file scanner.
    pub virustotal_key: Option<String>,
}

impl Credentials {
    /// Returns the credential configured for `service`, if any.
    #[must_use]
    pub fn for_service(&self, service: Service) -> Option<&str> {
        let value = match service {
            Service::Dshield => &self.dshield_email,
            Service::Urlhaus => &self.urlhaus_key,
            Service::Spur => &self.spur_token,
            Service::Virustotal => &self.virustotal_key,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }
}

/// Per-service cache time-to-live policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtlConfig {
    /// Overrides keyed by service; services without an entry use
    /// [`Service::default_ttl`].
    pub overrides: HashMap<Service, Duration>,
}

impl TtlConfig {
    /// Effective TTL for `service`.
    #[must_use]
    pub fn ttl_for(&self, service: Service) -> Duration {
        self.overrides
            .get(&service)
            .copied()
            .unwrap_or_else(|| service.default_ttl())
    }

    /// Set an override for `service`.
    pub fn set(&mut self, service: Service, ttl: Duration) {
        self.overrides.insert(service, ttl);
    }
}

/// Token-bucket parameters for one service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Tokens added per second.
    pub rate_per_second: f64,
    /// Maximum burst capacity.
    pub burst: u32,
}

/// Per-service rate-limit overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitOverrides {
    /// Overrides keyed by service; services without an entry use
    /// [`Service::default_rate_limit`].
    pub overrides: HashMap<Service, RateLimitConfig>,
}

impl RateLimitOverrides {
    /// Effective limit for `service`.
    #[must_use]
    pub fn limit_for(&self, service: Service) -> RateLimitConfig {
        self.overrides.get(&service).copied().unwrap_or_else(|| {
            let (rate_per_second, burst) = service.default_rate_limit();
            RateLimitConfig {
                rate_per_second,
                burst,
            }
        })
    }

    /// Set an override for `service`.
    pub fn set(&mut self, service: Service, limit: RateLimitConfig) {
        self.overrides.insert(service, limit);
    }
}

/// Exponential backoff configuration for the retry wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay for the first backoff.
    pub base: Duration,
    /// Multiplier applied per attempt (>= 1).
    pub factor: f64,
    /// Apply a random multiplier in `[0.5, 1.0]` to computed backoffs.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: Duration::from_secs(1),
            factor: 2.0,
            jitter: true,
        }
    }
}

/// Global configuration for the enrichment façade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Base directory for the filesystem cache tier.
    pub cache_base: PathBuf,
    /// Connection string for the durable shared cache; `None` composes the
    /// tier out.
    pub durable_url: Option<String>,
    /// Enable the durable shared cache tier when a URL is present.
    pub enable_durable_cache: bool,
    /// Enable per-service token buckets.
    pub enable_rate_limiting: bool,
    /// Enable telemetry counters.
    pub enable_telemetry: bool,
    /// Enable the file-scanner quota manager.
    pub enable_vt_quota: bool,
    /// Refuse file-scanner calls when daily or hourly usage reaches this
    /// percentage.
    pub vt_quota_threshold_percent: f64,
    /// Skip all enrichment; every call returns the empty record.
    pub skip_enrich: bool,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// Wall-clock deadline around the whole URL/host abuse call, retries
    /// included.
    pub urlhaus_deadline: Duration,
    /// How long a fetched quota snapshot stays fresh.
    pub quota_refresh_ttl: Duration,
    /// Per-service cache TTLs.
    pub ttls: TtlConfig,
    /// Per-service rate-limit overrides.
    pub rate_limits: RateLimitOverrides,
    /// Retry wrapper parameters.
    pub retry: RetryConfig,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            cache_base: PathBuf::from("cache"),
            durable_url: None,
            enable_durable_cache: true,
            enable_rate_limiting: true,
            enable_telemetry: true,
            enable_vt_quota: true,
            vt_quota_threshold_percent: 90.0,
            skip_enrich: false,
            http_timeout: Duration::from_secs(30),
            urlhaus_deadline: Duration::from_secs(30),
            quota_refresh_ttl: Duration::from_secs(300),
            ttls: TtlConfig::default(),
            rate_limits: RateLimitOverrides::default(),
            retry: RetryConfig::default(),
        }
    }
}
